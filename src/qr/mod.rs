//! QR Transport for Air-Gapped Signing
//!
//! Moves encoded transaction states and signed transactions across an air
//! gap as a sequence of JSON frames small enough for one QR code each.
//!
//! # Features
//! - Single frame when the payload fits, numbered frames otherwise
//! - Frames accepted in any order
//! - CRC32 over the reassembled payload, on top of the state's own checksum
//!
//! # Usage
//! ```rust,ignore
//! let frames = QrEncoder::new().encode_state(&state)?;
//!
//! let mut decoder = QrDecoder::new();
//! for frame in scanned_frames {
//!     if let ScanResult::Complete(bytes) = decoder.receive(&frame)? {
//!         let state = StateCodec::decode(&bytes)?;
//!     }
//! }
//! ```

pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::QrDecoder;
pub use encoder::QrEncoder;
pub use types::*;

use thiserror::Error;

/// QR module errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QrError {
    #[error("Invalid QR data: {0}")]
    InvalidData(String),

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Incomplete message: received {0}/{1} parts")]
    IncompleteMessage(usize, usize),

    #[error("Frame belongs to message {found}, expected {expected}")]
    MessageMismatch { expected: String, found: String },

    #[error("Unexpected content type: {0}")]
    UnexpectedContent(String),
}

/// Result type for QR operations
pub type QrResult<T> = Result<T, QrError>;

/// Default characters of base64 payload per frame
pub const DEFAULT_FRAGMENT_SIZE: usize = 400;

impl From<QrError> for crate::error::OfflineError {
    fn from(e: QrError) -> Self {
        crate::error::OfflineError::Encoding(format!("qr: {}", e))
    }
}
