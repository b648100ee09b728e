//! Unified error types for the offline signer
//!
//! Every fallible operation returns [`OfflineError`]. Each variant maps to a
//! stable [`ErrorCode`] so front-ends can turn a failure into an actionable
//! message without matching on display strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for all offline signer operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfflineError {
    /// Bad magic byte, truncated buffer, unknown tag or broken invariant
    #[error("Corrupt transaction state: {0}")]
    CorruptState(String),

    #[error("Unsupported {field} version {found} (this build understands up to {supported})")]
    UnsupportedVersion {
        field: &'static str,
        found: u32,
        supported: u32,
    },

    #[error("Checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Script reconstruction mismatch: {0}")]
    ScriptReconstructionMismatch(String),

    #[error("Missing required signer: {0}")]
    MissingRequiredSigner(String),

    #[error("Signer has no private key (watch-only capability cannot sign)")]
    MissingPrivateKey,

    #[error("Unknown signer: {0}")]
    UnknownSigner(String),

    #[error("Signer {0} has already contributed a signature")]
    DuplicateSignature(u32),

    #[error("Insufficient signatures: collected {collected}, required {required}")]
    InsufficientSignatures { collected: u32, required: u32 },

    #[error("Insufficient funds for fee: need {required} sats, have {available} sats")]
    InsufficientFundsForFee { required: u64, available: u64 },

    #[error("Signature for input {input} failed verification")]
    SignatureVerificationFailed { input: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl OfflineError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptState(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn script_mismatch(msg: impl Into<String>) -> Self {
        Self::ScriptReconstructionMismatch(msg.into())
    }

    /// Stable code for this error kind
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CorruptState(_) => ErrorCode::CorruptState,
            Self::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            Self::ChecksumMismatch { .. } => ErrorCode::ChecksumMismatch,
            Self::ScriptReconstructionMismatch(_) => ErrorCode::ScriptReconstructionMismatch,
            Self::MissingRequiredSigner(_) => ErrorCode::MissingRequiredSigner,
            Self::MissingPrivateKey => ErrorCode::MissingPrivateKey,
            Self::UnknownSigner(_) => ErrorCode::UnknownSigner,
            Self::DuplicateSignature(_) => ErrorCode::DuplicateSignature,
            Self::InsufficientSignatures { .. } => ErrorCode::InsufficientSignatures,
            Self::InsufficientFundsForFee { .. } => ErrorCode::InsufficientFundsForFee,
            Self::SignatureVerificationFailed { .. } => ErrorCode::SignatureVerificationFailed,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::Encoding(_) => ErrorCode::Encoding,
        }
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Integrity errors
    CorruptState,
    UnsupportedVersion,
    ChecksumMismatch,
    ScriptReconstructionMismatch,

    // Signer errors
    MissingRequiredSigner,
    MissingPrivateKey,
    UnknownSigner,
    DuplicateSignature,
    InsufficientSignatures,
    SignatureVerificationFailed,

    // Economic errors
    InsufficientFundsForFee,

    // Caller errors
    InvalidInput,
    Encoding,
}

impl ErrorCode {
    /// Short, user-facing hint for this failure
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorCode::CorruptState => "state file is malformed or not a transaction state",
            ErrorCode::UnsupportedVersion => "state was produced by a newer version; upgrade this tool",
            ErrorCode::ChecksumMismatch => "checksum mismatch, state file is corrupted or tampered",
            ErrorCode::ScriptReconstructionMismatch => {
                "precomputed scripts do not match their commitment; re-export the state"
            }
            ErrorCode::MissingRequiredSigner => "this transaction needs a post-quantum co-signer",
            ErrorCode::MissingPrivateKey => "a watch-only key cannot sign; supply the private key",
            ErrorCode::UnknownSigner => "this key is not part of the transaction's signer set",
            ErrorCode::DuplicateSignature => "this signer has already signed",
            ErrorCode::InsufficientSignatures => "more signatures are needed before finalizing",
            ErrorCode::SignatureVerificationFailed => "a produced signature did not verify; do not broadcast",
            ErrorCode::InsufficientFundsForFee => "inputs cannot cover the amount plus the new fee",
            ErrorCode::InvalidInput => "check the supplied parameters",
            ErrorCode::Encoding => "the transport string is not valid hex/base64",
        }
    }
}

/// Result type alias for offline signer operations
pub type OfflineResult<T> = Result<T, OfflineError>;

// Conversions from common error types

impl From<hex::FromHexError> for OfflineError {
    fn from(e: hex::FromHexError) -> Self {
        OfflineError::Encoding(format!("hex: {}", e))
    }
}

impl From<base64::DecodeError> for OfflineError {
    fn from(e: base64::DecodeError) -> Self {
        OfflineError::Encoding(format!("base64: {}", e))
    }
}

impl From<bitcoin::address::ParseError> for OfflineError {
    fn from(e: bitcoin::address::ParseError) -> Self {
        OfflineError::InvalidInput(format!("address: {}", e))
    }
}
