//! Multisig signature status
//!
//! Pure reads over a state's collected signatures.

use serde::{Deserialize, Serialize};

use crate::error::OfflineResult;
use crate::state::SerializedTransactionState;

/// Where a multisig state is in its signing lifecycle
///
/// Finalization produces a `FinalizedTransaction` and leaves the state
/// itself unchanged, so there is no finalized phase here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "collected")]
pub enum MultisigPhase {
    Created,
    PartiallySigned(u32),
    ReadyToFinalize(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    pub collected: u32,
    pub required: u32,
    pub total_signers: u32,
    pub is_complete: bool,
    /// Signer indices that have contributed, ascending
    pub signed_indices: Vec<u32>,
}

impl SignatureStatus {
    pub fn remaining(&self) -> u32 {
        self.required.saturating_sub(self.collected)
    }

    pub fn phase(&self) -> MultisigPhase {
        match self.collected {
            0 => MultisigPhase::Created,
            k if k < self.required => MultisigPhase::PartiallySigned(k),
            k => MultisigPhase::ReadyToFinalize(k),
        }
    }
}

pub fn get_signature_status(state: &SerializedTransactionState) -> OfflineResult<SignatureStatus> {
    let ms = state.multisig()?;
    let collected = ms.collected();
    Ok(SignatureStatus {
        collected,
        required: ms.minimum_signatures,
        total_signers: ms.pubkeys.len() as u32,
        is_complete: collected >= ms.minimum_signatures,
        signed_indices: ms.collected_signatures.keys().copied().collect(),
    })
}

pub fn phase(state: &SerializedTransactionState) -> OfflineResult<MultisigPhase> {
    Ok(get_signature_status(state)?.phase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(collected: u32, required: u32) -> SignatureStatus {
        SignatureStatus {
            collected,
            required,
            total_signers: 3,
            is_complete: collected >= required,
            signed_indices: (0..collected).collect(),
        }
    }

    #[test]
    fn test_phase_transitions() {
        assert_eq!(status(0, 2).phase(), MultisigPhase::Created);
        assert_eq!(status(1, 2).phase(), MultisigPhase::PartiallySigned(1));
        assert_eq!(status(2, 2).phase(), MultisigPhase::ReadyToFinalize(2));
        assert_eq!(status(3, 2).phase(), MultisigPhase::ReadyToFinalize(3));
    }

    #[test]
    fn test_remaining() {
        assert_eq!(status(1, 3).remaining(), 2);
        assert_eq!(status(3, 2).remaining(), 0);
    }

    #[test]
    fn test_phase_serializes_tagged() {
        let json = serde_json::to_string(&MultisigPhase::PartiallySigned(1)).unwrap();
        assert_eq!(json, r#"{"phase":"partially_signed","collected":1}"#);
    }
}
