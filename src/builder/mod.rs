//! Transaction Reconstruction
//!
//! Script derivation, size estimation, output/fee planning and the
//! reconstructor that turns a state into an unsigned transaction.

pub mod plan;
pub mod reconstruct;
pub mod scripts;
pub mod sizing;


pub use plan::{commitment_value, plan_fees, FeePlan, OutputRole, OutputTemplate, PlannedOutput};
pub use reconstruct::{reconstruct, Reconstructor, TransactionBuilder, QUANTUM_DIGEST_TAG};
pub use scripts::{Commitment, MIN_COMMITMENT_VALUE};
pub use sizing::{estimate_vsize, InputKind, TxSizeConstants};
