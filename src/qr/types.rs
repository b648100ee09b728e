//! QR Frame Types

use serde::{Deserialize, Serialize};

/// Payloads carried over the air gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    /// Encoded transaction state, online -> offline or signer -> signer
    #[serde(rename = "application/x-offline-state")]
    TransactionState,
    /// Finalized transaction, offline -> online for broadcast
    #[serde(rename = "application/x-signed-tx")]
    SignedTransaction,
}

/// One QR code worth of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrFrame {
    /// Random id shared by every frame of one message
    pub id: String,
    /// Frame index (0-based)
    pub part: usize,
    /// Total number of frames
    pub total: usize,
    pub content_type: ContentType,
    /// Base64 chunk of the payload
    pub data: String,
    /// CRC32 of the whole payload, carried by the last frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<u32>,
}

impl QrFrame {
    pub fn is_last(&self) -> bool {
        self.part + 1 == self.total
    }
}

/// QR generation options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrOptions {
    /// Base64 characters per frame
    pub fragment_size: usize,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            fragment_size: super::DEFAULT_FRAGMENT_SIZE,
        }
    }
}

/// Scan result from the decoder
#[derive(Debug, Clone, PartialEq)]
pub enum ScanResult {
    /// All frames received and verified
    Complete(Vec<u8>),
    /// Waiting for more frames
    Partial {
        /// Number of frames received
        received: usize,
        /// Total frames expected
        total: usize,
        /// Completion fraction
        progress: f32,
    },
}
