//! In-memory secp256k1 signer
//!
//! Secret bytes live in a `Zeroizing` buffer and are turned into a
//! `SecretKey` only for the duration of one signature.

use std::fmt;
use std::str::FromStr;

use bitcoin::key::TapTweak;
use bitcoin::secp256k1::{ecdsa, schnorr, All, Keypair, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::taproot::TapNodeHash;
use bitcoin::PrivateKey;
use zeroize::Zeroizing;

use crate::error::{OfflineError, OfflineResult};

use super::EcSigner;

pub struct KeySigner {
    secret: Zeroizing<[u8; 32]>,
    public_key: PublicKey,
    secp: Secp256k1<All>,
}

impl KeySigner {
    /// Signer from raw 32-byte secret
    pub fn from_secret_bytes(bytes: &[u8]) -> OfflineResult<Self> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(bytes)
            .map_err(|_| OfflineError::invalid_input("secret key is not a valid secp256k1 scalar"))?;
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&sk.secret_bytes());
        let public_key = PublicKey::from_secret_key(&secp, &sk);
        Ok(Self { secret, public_key, secp })
    }

    pub fn from_hex(secret_hex: &str) -> OfflineResult<Self> {
        let bytes = Zeroizing::new(hex::decode(secret_hex.trim())?);
        Self::from_secret_bytes(&bytes)
    }

    pub fn from_wif(wif: &str) -> OfflineResult<Self> {
        let key = PrivateKey::from_str(wif.trim())
            .map_err(|_| OfflineError::invalid_input("malformed WIF private key"))?;
        if !key.compressed {
            return Err(OfflineError::invalid_input("uncompressed keys are not supported"));
        }
        Self::from_secret_bytes(&key.inner.secret_bytes())
    }

    fn secret_key(&self) -> OfflineResult<SecretKey> {
        SecretKey::from_slice(self.secret.as_ref())
            .map_err(|_| OfflineError::invalid_input("secret key is not a valid secp256k1 scalar"))
    }
}

impl EcSigner for KeySigner {
    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn sign_ecdsa(&self, digest: &[u8; 32]) -> OfflineResult<ecdsa::Signature> {
        let sk = self.secret_key()?;
        Ok(self.secp.sign_ecdsa(&Message::from_digest(*digest), &sk))
    }

    fn sign_schnorr(&self, digest: &[u8; 32], merkle_root: Option<TapNodeHash>) -> OfflineResult<schnorr::Signature> {
        let keypair = Keypair::from_secret_key(&self.secp, &self.secret_key()?);
        let tweaked = keypair.tap_tweak(&self.secp, merkle_root);
        // no aux randomness keeps signatures deterministic
        Ok(self
            .secp
            .sign_schnorr_no_aux_rand(&Message::from_digest(*digest), &tweaked.to_keypair()))
    }
}

impl fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySigner")
            .field("public_key", &self.public_key.to_string())
            .finish_non_exhaustive()
    }
}
