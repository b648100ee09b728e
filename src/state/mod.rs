//! Offline Transaction State
//!
//! The portable record that travels between the online builder and the
//! offline signer:
//! - Data model with structural invariants
//! - Deterministic binary codec with SHA-256d integrity checksum
//! - Export from online-side parameters
//! - Validation and redacted inspection for untrusted input

pub mod codec;
pub mod export;
pub mod inspect;
pub mod types;
mod wire;


pub use codec::{decode, encode, StateCodec};
pub use export::{export, export_with_settings, ExportRequest, MultisigSetup};
pub use inspect::{inspect, validate, StateSummary};
pub use types::*;

/// First byte of every encoded state
pub const MAGIC_BYTE: u8 = 0x42;

/// Current wire layout version
pub const FORMAT_VERSION: u32 = 1;

/// Current transaction construction rules version
pub const CONSENSUS_VERSION: u32 = 1;

/// Smallest change or recipient output under consensus version 1
///
/// Part of the construction rules: every machine reconstructing a state
/// must agree on it, so it is not a local setting.
pub const DUST_LIMIT: u64 = 546;

/// Length of the trailing SHA-256d checksum
pub const CHECKSUM_LEN: usize = 32;
