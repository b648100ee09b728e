//! QR Frame Decoder
//!
//! Collects the frames of one message in any order and returns the payload
//! once every frame has arrived and the CRC32 matches.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::types::{ContentType, QrFrame, ScanResult};
use super::{QrError, QrResult};
use crate::error::OfflineResult;
use crate::state::{SerializedTransactionState, StateCodec};

struct PendingMessage {
    id: String,
    total: usize,
    content_type: ContentType,
    parts: BTreeMap<usize, String>,
    checksum: Option<u32>,
}

/// QR frame decoder for a single message
#[derive(Default)]
pub struct QrDecoder {
    pending: Option<PendingMessage>,
    /// Content type of the last completed message
    completed: Option<ContentType>,
}

impl QrDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {
            pending: None,
            completed: None,
        }
    }

    /// Reset decoder state
    pub fn reset(&mut self) {
        self.pending = None;
        self.completed = None;
    }

    /// Content type of the message being assembled, or of the last one completed
    pub fn content_type(&self) -> Option<ContentType> {
        self.pending.as_ref().map(|p| p.content_type).or(self.completed)
    }

    /// Fraction of frames received so far
    pub fn progress(&self) -> f32 {
        self.pending
            .as_ref()
            .map(|p| p.parts.len() as f32 / p.total as f32)
            .unwrap_or(0.0)
    }

    /// Feed one scanned frame
    pub fn receive(&mut self, qr_data: &str) -> QrResult<ScanResult> {
        let frame: QrFrame = serde_json::from_str(qr_data)
            .map_err(|e| QrError::InvalidData(format!("Invalid frame: {}", e)))?;

        if frame.total == 0 || frame.part >= frame.total {
            return Err(QrError::InvalidData(format!(
                "frame {} of {} is out of range",
                frame.part, frame.total
            )));
        }

        let pending = self.pending.get_or_insert_with(|| PendingMessage {
            id: frame.id.clone(),
            total: frame.total,
            content_type: frame.content_type,
            parts: BTreeMap::new(),
            checksum: None,
        });

        if pending.id != frame.id {
            return Err(QrError::MessageMismatch {
                expected: pending.id.clone(),
                found: frame.id,
            });
        }
        if pending.total != frame.total || pending.content_type != frame.content_type {
            return Err(QrError::InvalidData("frame header disagrees with earlier frames".to_string()));
        }

        if let Some(checksum) = frame.checksum {
            pending.checksum = Some(checksum);
        }
        pending.parts.insert(frame.part, frame.data);

        if pending.parts.len() < pending.total {
            return Ok(ScanResult::Partial {
                received: pending.parts.len(),
                total: pending.total,
                progress: pending.parts.len() as f32 / pending.total as f32,
            });
        }

        let result = Self::assemble(pending);
        self.completed = Some(pending.content_type);
        self.pending = None;
        result.map(ScanResult::Complete)
    }

    fn assemble(pending: &PendingMessage) -> QrResult<Vec<u8>> {
        let encoded: String = pending.parts.values().map(String::as_str).collect();
        let data = BASE64
            .decode(encoded)
            .map_err(|e| QrError::InvalidData(format!("Base64 decode error: {}", e)))?;

        let expected = pending
            .checksum
            .ok_or_else(|| QrError::InvalidData("last frame carries no checksum".to_string()))?;
        if crc32fast::hash(&data) != expected {
            return Err(QrError::ChecksumMismatch);
        }
        Ok(data)
    }

    /// Decode a complete set of frames into a transaction state
    pub fn decode_state(frames: &[String]) -> OfflineResult<SerializedTransactionState> {
        let mut decoder = Self::new();
        for frame in frames {
            if let ScanResult::Complete(bytes) = decoder.receive(frame)? {
                if decoder.content_type() != Some(ContentType::TransactionState) {
                    return Err(QrError::UnexpectedContent(format!("{:?}", decoder.content_type())).into());
                }
                return StateCodec::decode(&bytes);
            }
        }
        let received = decoder.pending.as_ref().map_or(0, |p| p.parts.len());
        let total = decoder.pending.as_ref().map_or(frames.len(), |p| p.total);
        Err(QrError::IncompleteMessage(received, total).into())
    }
}
