//! Signature hash derivation
//!
//! BIP-341 key-path digests for Taproot inputs, BIP-143 digests for
//! P2WPKH and P2WSH multisig inputs.

use bitcoin::hashes::Hash;
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::Script;
use serde::Serialize;

use crate::builder::{InputKind, TransactionBuilder};
use crate::error::{OfflineError, OfflineResult};

/// Signature algorithm an input digest is signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SighashAlgorithm {
    Schnorr,
    Ecdsa,
}

/// Digest to sign for one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSighash {
    pub index: usize,
    pub algorithm: SighashAlgorithm,
    #[serde(with = "hex_digest")]
    pub digest: [u8; 32],
}

/// Digests for every input of the builder's unsigned transaction
pub fn signature_hashes(builder: &TransactionBuilder) -> OfflineResult<Vec<InputSighash>> {
    let tx = builder.unsigned_transaction();
    let prevouts = builder.prevouts();
    let mut cache = SighashCache::new(tx);

    builder
        .input_kinds()
        .iter()
        .enumerate()
        .map(|(index, kind)| {
            let prevout = &prevouts[index];
            let (algorithm, digest) = match kind {
                InputKind::TaprootKeyPath => {
                    let hash = cache
                        .taproot_key_spend_signature_hash(index, &Prevouts::All(prevouts), TapSighashType::Default)
                        .map_err(|e| OfflineError::corrupt(format!("taproot sighash for input {}: {}", index, e)))?;
                    (SighashAlgorithm::Schnorr, hash.to_byte_array())
                }
                InputKind::SegwitV0KeyHash => {
                    let hash = cache
                        .p2wpkh_signature_hash(index, &prevout.script_pubkey, prevout.value, EcdsaSighashType::All)
                        .map_err(|e| OfflineError::corrupt(format!("segwit sighash for input {}: {}", index, e)))?;
                    (SighashAlgorithm::Ecdsa, hash.to_byte_array())
                }
                InputKind::MultisigWitness { .. } => {
                    let witness_script: &Script = builder
                        .witness_script()
                        .ok_or_else(|| OfflineError::corrupt("multisig input without witness script"))?;
                    let hash = cache
                        .p2wsh_signature_hash(index, witness_script, prevout.value, EcdsaSighashType::All)
                        .map_err(|e| OfflineError::corrupt(format!("p2wsh sighash for input {}: {}", index, e)))?;
                    (SighashAlgorithm::Ecdsa, hash.to_byte_array())
                }
            };
            Ok(InputSighash {
                index,
                algorithm,
                digest,
            })
        })
        .collect()
}

mod hex_digest {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(digest: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(digest))
    }
}
