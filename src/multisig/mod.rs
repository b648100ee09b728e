//! Multisig Coordination
//!
//! Threshold signing across independent, disconnected signers:
//! - `add_signature` records one participant's signatures in a new state
//! - `get_signature_status` / `phase` report progress
//! - `finalize` assembles the witness in ascending signer order
//! - `merge_signatures` reconciles two separately signed copies

mod coordinator;
mod status;


pub use coordinator::*;
pub use status::*;
