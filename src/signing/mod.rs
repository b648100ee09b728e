//! Signing Engine
//!
//! Signs a reconstructed transaction with the supplied capability and
//! returns the broadcast-ready encoding. Every produced signature is
//! verified before the transaction is returned.

pub mod sighash;

pub use sighash::{signature_hashes, InputSighash, SighashAlgorithm};

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::{ecdsa, Transaction, Witness};
use serde::{Deserialize, Serialize};

use crate::builder::{Reconstructor, TransactionBuilder};
use crate::error::{OfflineError, OfflineResult};
use crate::fees::{rebuild_with_new_fees_with_settings, FeeOverrides};
use crate::{log_error, log_info};
use crate::multisig;
use crate::signer::{verify_ecdsa, verify_schnorr, SignerCapability};
use crate::state::StateCodec;
use crate::types::TransactionType;
use crate::utils::config::OfflineSettings;

/// Signed transaction ready for an external broadcaster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTransaction {
    pub txid: String,
    /// Consensus-encoded transaction, hex
    pub hex: String,
    pub vsize: u64,
    pub fee: u64,
    /// Post-quantum co-signature over the unsigned txid and commitment, hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantum_signature: Option<String>,
}

impl FinalizedTransaction {
    pub(crate) fn from_transaction(tx: &Transaction, fee: u64, quantum_signature: Option<Vec<u8>>) -> Self {
        Self {
            txid: tx.compute_txid().to_string(),
            hex: serialize_hex(tx),
            vsize: tx.vsize() as u64,
            fee,
            quantum_signature: quantum_signature.map(hex::encode),
        }
    }
}

/// Signer capability plus optional fee overrides applied before signing
#[derive(Debug, Clone)]
pub struct SignerOptions {
    pub capability: SignerCapability,
    pub new_fee_rate: Option<f64>,
    pub new_priority_fee: Option<u64>,
    pub new_gas_sat_fee: Option<u64>,
    pub settings: OfflineSettings,
}

impl SignerOptions {
    pub fn new(capability: SignerCapability) -> Self {
        Self {
            capability,
            new_fee_rate: None,
            new_priority_fee: None,
            new_gas_sat_fee: None,
            settings: OfflineSettings::default(),
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.new_fee_rate = Some(fee_rate);
        self
    }

    pub fn with_priority_fee(mut self, priority_fee: u64) -> Self {
        self.new_priority_fee = Some(priority_fee);
        self
    }

    pub fn with_gas_sat_fee(mut self, gas_sat_fee: u64) -> Self {
        self.new_gas_sat_fee = Some(gas_sat_fee);
        self
    }

    pub fn with_settings(mut self, settings: OfflineSettings) -> Self {
        self.settings = settings;
        self
    }

    fn has_fee_overrides(&self) -> bool {
        self.new_fee_rate.is_some() || self.new_priority_fee.is_some() || self.new_gas_sat_fee.is_some()
    }
}

/// Sign every input of `builder`'s transaction
///
/// MultiSig builders add the capability's signature when it has not signed
/// yet, then finalize. Once the threshold is met any capability, watch-only
/// included, may finalize; below it a capability that cannot contribute is
/// refused with `MissingPrivateKey` or `UnknownSigner`.
pub fn sign(builder: &TransactionBuilder) -> OfflineResult<FinalizedTransaction> {
    if builder.state().transaction_type == TransactionType::MultiSig {
        return sign_multisig(builder);
    }

    let signer = builder.capability().ec_signer()?;
    let pubkey = signer.public_key();
    let mut tx = builder.unsigned_transaction().clone();

    for sighash in signature_hashes(builder)? {
        let index = sighash.index;
        let witness = match sighash.algorithm {
            SighashAlgorithm::Schnorr => {
                let signature = signer.sign_schnorr(&sighash.digest, None)?;
                let script = builder.prevouts()[index].script_pubkey.as_bytes();
                let output_key = script
                    .get(2..34)
                    .and_then(|key| XOnlyPublicKey::from_slice(key).ok())
                    .ok_or(OfflineError::SignatureVerificationFailed { input: index })?;
                if !verify_schnorr(&output_key, &sighash.digest, &signature) {
                    return Err(OfflineError::SignatureVerificationFailed { input: index });
                }
                let mut witness = Witness::new();
                witness.push(signature.serialize());
                witness
            }
            SighashAlgorithm::Ecdsa => {
                let signature = signer.sign_ecdsa(&sighash.digest)?;
                if !verify_ecdsa(&pubkey, &sighash.digest, &signature) {
                    return Err(OfflineError::SignatureVerificationFailed { input: index });
                }
                let mut witness = Witness::new();
                witness.push(ecdsa::Signature::sighash_all(signature).to_vec());
                witness.push(pubkey.serialize());
                witness
            }
        };
        tx.input[index].witness = witness;
    }

    let quantum_signature = quantum_cosign(builder)?;
    let finalized = FinalizedTransaction::from_transaction(&tx, builder.fee(), quantum_signature);
    log_info!(
        "signing",
        "Transaction signed",
        txid = finalized.txid,
        vsize = finalized.vsize,
        fee = finalized.fee
    );
    Ok(finalized)
}

fn sign_multisig(builder: &TransactionBuilder) -> OfflineResult<FinalizedTransaction> {
    let state = builder.state();
    let capability = builder.capability();
    let ms = state.multisig()?;

    let pubkey = capability.public_key();
    let own_index = ms.signer_index(&pubkey);
    let unsigned_participant = own_index.map_or(false, |i| !ms.collected_signatures.contains_key(&i));

    if capability.can_sign() && unsigned_participant {
        let outcome = multisig::add_signature(state, capability)?;
        return multisig::finalize(&outcome.state);
    }
    if ms.collected() < ms.minimum_signatures {
        if !capability.can_sign() {
            return Err(OfflineError::MissingPrivateKey);
        }
        if own_index.is_none() {
            return Err(OfflineError::UnknownSigner(format!("{} is not a multisig participant", pubkey)));
        }
    }
    multisig::finalize(state)
}

/// Post-quantum co-signature, verified with the co-signer's own check
fn quantum_cosign(builder: &TransactionBuilder) -> OfflineResult<Option<Vec<u8>>> {
    let Some(digest) = builder.quantum_digest() else {
        return Ok(None);
    };
    let quantum = builder
        .capability()
        .quantum_signer()
        .ok_or_else(|| OfflineError::MissingRequiredSigner("post-quantum co-signer".to_string()))?;
    let signature = quantum.sign(&digest)?;
    if !quantum.verify(&digest, &signature) {
        log_error!("signing", "Post-quantum co-signature rejected by its own verifier");
        // reported one past the last input
        return Err(OfflineError::SignatureVerificationFailed {
            input: builder.unsigned_transaction().input.len(),
        });
    }
    Ok(Some(signature))
}

/// Decode, optionally rebuild fees, reconstruct and sign
pub fn import_sign_and_export(bytes: &[u8], options: &SignerOptions) -> OfflineResult<FinalizedTransaction> {
    let mut state = StateCodec::decode_with_settings(bytes, &options.settings)?;

    if options.has_fee_overrides() {
        let fee_rate = options.new_fee_rate.unwrap_or(state.base_params.fee_rate);
        let overrides = FeeOverrides {
            priority_fee: options.new_priority_fee,
            gas_sat_fee: options.new_gas_sat_fee,
        };
        state = rebuild_with_new_fees_with_settings(&state, fee_rate, &overrides, &options.settings)?;
    }

    let builder = Reconstructor::reconstruct_with_settings(&state, &options.capability, &options.settings)?;
    sign(&builder)
}

#[cfg(test)]
mod tests;
