//! Offline Signer Core Library
//!
//! Separates Bitcoin transaction construction (needs the network) from
//! signing (needs keys, not the network) for air-gapped, hardware-wallet
//! and multi-party workflows.
//!
//! # Architecture
//!
//! This crate provides:
//! - **state**: Portable transaction state, its binary codec, export and inspection
//! - **builder**: Deterministic reconstruction of the unsigned transaction
//! - **signing**: Signature production, verification and finalization
//! - **fees**: Replace-by-fee rebuild of an exported state
//! - **multisig**: Threshold signature collection across disconnected signers
//! - **signer**: Watch-only, full and hybrid (post-quantum) signer capabilities
//! - **qr**: Frame transport for moving states across an air gap
//!
//! # Security
//!
//! States never contain key material. Secret keys handed to [`signer::KeySigner`]
//! are held in `zeroize` buffers and cleared on drop.
//!
//! # Example
//!
//! ```rust,ignore
//! use offline_signer::{state, builder, signing, signer::SignerCapability};
//!
//! // online machine
//! let state = state::export(&request, &signer_public_key)?;
//! let bytes = state::encode(&state);
//!
//! // offline machine
//! let state = state::decode(&bytes)?;
//! let builder = builder::reconstruct(&state, &SignerCapability::full(key_signer))?;
//! let signed = signing::sign(&builder)?;
//! println!("{}", signed.hex);
//! ```

pub mod error;
pub mod types;
pub mod utils;

pub mod builder;
pub mod fees;
pub mod multisig;
pub mod qr;
pub mod signer;
pub mod signing;
pub mod state;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export key types for convenience
pub use error::{ErrorCode, OfflineError, OfflineResult};
pub use types::{NetworkKind, TransactionType};
pub use utils::config::OfflineSettings;

pub use builder::{reconstruct, Reconstructor, TransactionBuilder};
pub use fees::{rebuild_with_new_fees, FeeOverrides};
pub use multisig::{add_signature, finalize, get_signature_status, merge_signatures, SignatureStatus};
pub use signer::{EcSigner, KeySigner, QuantumSigner, SignerCapability};
pub use signing::{import_sign_and_export, sign, FinalizedTransaction, SignerOptions};
pub use state::{SerializedTransactionState, StateCodec};
