//! Shared types for the offline signer
//!
//! Enums that cross module boundaries live here so the codec, the
//! reconstructor and the inspector agree on tags and names.

use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, OfflineResult};

// =============================================================================
// Transaction Types
// =============================================================================

/// Kind of transaction captured by a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Plain value transfer to `to`
    Funding,
    /// Contract deployment through a Taproot commitment output
    Deployment,
    /// Contract call through a Taproot commitment output
    Interaction,
    /// m-of-n P2WSH spend coordinated across independent signers
    MultiSig,
    /// Funds a P2WSH output locked to a caller-provided witness script
    CustomScript,
    /// RBF cancellation: every input returns to `from`
    Cancel,
}

impl TransactionType {
    pub fn tag(&self) -> u8 {
        match self {
            TransactionType::Funding => 0,
            TransactionType::Deployment => 1,
            TransactionType::Interaction => 2,
            TransactionType::MultiSig => 3,
            TransactionType::CustomScript => 4,
            TransactionType::Cancel => 5,
        }
    }

    pub fn from_tag(tag: u8) -> OfflineResult<Self> {
        match tag {
            0 => Ok(TransactionType::Funding),
            1 => Ok(TransactionType::Deployment),
            2 => Ok(TransactionType::Interaction),
            3 => Ok(TransactionType::MultiSig),
            4 => Ok(TransactionType::CustomScript),
            5 => Ok(TransactionType::Cancel),
            other => Err(OfflineError::corrupt(format!("unknown transaction type tag {}", other))),
        }
    }

    /// Whether the state carries a precomputed script block
    pub fn requires_precomputed(&self) -> bool {
        matches!(self, TransactionType::Deployment | TransactionType::Interaction)
    }

    /// Whether the state carries a multisig block
    pub fn requires_multisig(&self) -> bool {
        matches!(self, TransactionType::MultiSig)
    }

    /// Whether the state carries a type-specific extension block
    pub fn requires_extension(&self) -> bool {
        matches!(self, TransactionType::CustomScript | TransactionType::Cancel)
    }
}

// =============================================================================
// Network Types
// =============================================================================

/// Network versioning constants a state is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    Mainnet,
    Testnet,
    Regtest,
    /// Custom network: regtest consensus parameters, address network not enforced
    Custom,
}

impl NetworkKind {
    pub fn tag(&self) -> u8 {
        match self {
            NetworkKind::Mainnet => 0,
            NetworkKind::Testnet => 1,
            NetworkKind::Regtest => 2,
            NetworkKind::Custom => 3,
        }
    }

    pub fn from_tag(tag: u8) -> OfflineResult<Self> {
        match tag {
            0 => Ok(NetworkKind::Mainnet),
            1 => Ok(NetworkKind::Testnet),
            2 => Ok(NetworkKind::Regtest),
            3 => Ok(NetworkKind::Custom),
            other => Err(OfflineError::corrupt(format!("unknown network tag {}", other))),
        }
    }

    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            NetworkKind::Mainnet => bitcoin::Network::Bitcoin,
            NetworkKind::Testnet => bitcoin::Network::Testnet,
            NetworkKind::Regtest | NetworkKind::Custom => bitcoin::Network::Regtest,
        }
    }

    pub fn is_testnet(&self) -> bool {
        !matches!(self, NetworkKind::Mainnet)
    }
}
