//! QR Frame Encoder
//!
//! Splits a payload into JSON frames of at most `fragment_size` base64
//! characters each.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

use super::types::{ContentType, QrFrame, QrOptions};
use super::{QrError, QrResult};
use crate::signing::FinalizedTransaction;
use crate::state::{SerializedTransactionState, StateCodec};

/// QR frame encoder
pub struct QrEncoder {
    options: QrOptions,
}

impl QrEncoder {
    /// Create a new encoder with default options
    pub fn new() -> Self {
        Self {
            options: QrOptions::default(),
        }
    }

    /// Create encoder with custom options
    pub fn with_options(options: QrOptions) -> Self {
        Self { options }
    }

    /// Encode `data` as one or more frame strings
    pub fn encode(&self, data: &[u8], content_type: ContentType) -> QrResult<Vec<String>> {
        if self.options.fragment_size == 0 {
            return Err(QrError::InvalidData("fragment size must be positive".to_string()));
        }
        if data.is_empty() {
            return Err(QrError::InvalidData("empty payload".to_string()));
        }

        let encoded = BASE64.encode(data);
        let checksum = crc32fast::hash(data);
        let id = generate_message_id();

        // base64 is ASCII, so byte chunks are valid strings
        let chunks: Vec<&[u8]> = encoded.as_bytes().chunks(self.options.fragment_size).collect();
        let total = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(part, chunk)| {
                let frame = QrFrame {
                    id: id.clone(),
                    part,
                    total,
                    content_type,
                    data: String::from_utf8_lossy(chunk).into_owned(),
                    checksum: if part + 1 == total { Some(checksum) } else { None },
                };
                serde_json::to_string(&frame).map_err(|e| QrError::InvalidData(e.to_string()))
            })
            .collect()
    }

    /// Encode a transaction state for transfer to a signer
    pub fn encode_state(&self, state: &SerializedTransactionState) -> QrResult<Vec<String>> {
        self.encode(&StateCodec::encode(state), ContentType::TransactionState)
    }

    /// Encode a finalized transaction for transfer back to the broadcaster
    pub fn encode_finalized(&self, tx: &FinalizedTransaction) -> QrResult<Vec<String>> {
        let json = serde_json::to_vec(tx).map_err(|e| QrError::InvalidData(e.to_string()))?;
        self.encode(&json, ContentType::SignedTransaction)
    }
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a unique message ID
fn generate_message_id() -> String {
    format!("{:016x}", OsRng.next_u64())
}
