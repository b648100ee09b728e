//! Signer Capability
//!
//! The offline signer never derives keys itself. Callers hand in a
//! capability that either only knows a public key (watch-only), can
//! produce EC signatures, or additionally carries a post-quantum co-signer.

mod key;

pub use key::KeySigner;

use std::fmt;
use std::sync::Arc;

use bitcoin::secp256k1::{ecdsa, schnorr, Message, PublicKey, Secp256k1, XOnlyPublicKey};
use bitcoin::taproot::TapNodeHash;

use crate::error::{OfflineError, OfflineResult};

/// Classical EC signer over 32-byte digests
pub trait EcSigner: Send + Sync {
    fn public_key(&self) -> PublicKey;

    /// RFC 6979 ECDSA signature over `digest`
    fn sign_ecdsa(&self, digest: &[u8; 32]) -> OfflineResult<ecdsa::Signature>;

    /// BIP-340 signature with the key tweaked for `merkle_root` (BIP-341)
    fn sign_schnorr(&self, digest: &[u8; 32], merkle_root: Option<TapNodeHash>) -> OfflineResult<schnorr::Signature>;
}

/// Post-quantum co-signer
pub trait QuantumSigner: Send + Sync {
    fn public_key(&self) -> Vec<u8>;

    fn sign(&self, digest: &[u8; 32]) -> OfflineResult<Vec<u8>>;

    fn verify(&self, digest: &[u8; 32], signature: &[u8]) -> bool;
}

/// What the caller is able to do with its key material
#[derive(Clone)]
pub enum SignerCapability {
    /// Public key only; can reconstruct but not sign
    WatchOnly(PublicKey),
    /// EC signing
    Full(Arc<dyn EcSigner>),
    /// EC signing plus a post-quantum co-signer
    Hybrid {
        classical: Arc<dyn EcSigner>,
        quantum: Arc<dyn QuantumSigner>,
    },
}

impl SignerCapability {
    pub fn watch_only(public_key: PublicKey) -> Self {
        SignerCapability::WatchOnly(public_key)
    }

    pub fn full(signer: impl EcSigner + 'static) -> Self {
        SignerCapability::Full(Arc::new(signer))
    }

    pub fn hybrid(classical: impl EcSigner + 'static, quantum: impl QuantumSigner + 'static) -> Self {
        SignerCapability::Hybrid {
            classical: Arc::new(classical),
            quantum: Arc::new(quantum),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            SignerCapability::WatchOnly(pk) => *pk,
            SignerCapability::Full(signer) => signer.public_key(),
            SignerCapability::Hybrid { classical, .. } => classical.public_key(),
        }
    }

    pub fn can_sign(&self) -> bool {
        !matches!(self, SignerCapability::WatchOnly(_))
    }

    /// EC signer, or `MissingPrivateKey` for watch-only capabilities
    pub fn ec_signer(&self) -> OfflineResult<&dyn EcSigner> {
        match self {
            SignerCapability::WatchOnly(_) => Err(OfflineError::MissingPrivateKey),
            SignerCapability::Full(signer) => Ok(signer.as_ref()),
            SignerCapability::Hybrid { classical, .. } => Ok(classical.as_ref()),
        }
    }

    pub fn quantum_signer(&self) -> Option<&dyn QuantumSigner> {
        match self {
            SignerCapability::Hybrid { quantum, .. } => Some(quantum.as_ref()),
            _ => None,
        }
    }

    /// Watch-only view of this capability
    pub fn to_watch_only(&self) -> Self {
        SignerCapability::WatchOnly(self.public_key())
    }
}

impl fmt::Debug for SignerCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            SignerCapability::WatchOnly(_) => "WatchOnly",
            SignerCapability::Full(_) => "Full",
            SignerCapability::Hybrid { .. } => "Hybrid",
        };
        f.debug_struct("SignerCapability")
            .field("kind", &kind)
            .field("public_key", &self.public_key().to_string())
            .finish()
    }
}

/// Verify an ECDSA signature over `digest`
pub fn verify_ecdsa(public_key: &PublicKey, digest: &[u8; 32], signature: &ecdsa::Signature) -> bool {
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&Message::from_digest(*digest), signature, public_key)
        .is_ok()
}

/// Verify a BIP-340 signature over `digest` against an output key
pub fn verify_schnorr(output_key: &XOnlyPublicKey, digest: &[u8; 32], signature: &schnorr::Signature) -> bool {
    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(signature, &Message::from_digest(*digest), output_key)
        .is_ok()
}
