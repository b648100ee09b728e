//! Deterministic reconstruction
//!
//! Rebuilds the unsigned transaction a state describes. Two machines given
//! the same state and public key produce byte-identical transactions.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::transaction::Version;
use bitcoin::{Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use subtle::ConstantTimeEq;

use crate::error::{OfflineError, OfflineResult};
use crate::log_info;
use crate::signer::SignerCapability;
use crate::state::SerializedTransactionState;
use crate::utils::config::OfflineSettings;

use super::plan::{plan_fees, FeePlan, OutputTemplate};
use super::scripts::{self, Commitment};
use super::sizing::InputKind;

/// Domain tag for the post-quantum co-signature digest
pub const QUANTUM_DIGEST_TAG: &[u8] = b"offline-signer/quantum";

/// Unsigned transaction plus everything needed to sign it
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    state: SerializedTransactionState,
    capability: SignerCapability,
    plan: FeePlan,
    commitment: Option<Commitment>,
    prevouts: Vec<TxOut>,
    unsigned_tx: Transaction,
}

impl TransactionBuilder {
    pub fn state(&self) -> &SerializedTransactionState {
        &self.state
    }

    pub fn capability(&self) -> &SignerCapability {
        &self.capability
    }

    pub fn plan(&self) -> &FeePlan {
        &self.plan
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        self.commitment.as_ref()
    }

    pub fn input_kinds(&self) -> &[InputKind] {
        &self.plan.input_kinds
    }

    pub fn witness_script(&self) -> Option<&ScriptBuf> {
        self.plan.witness_script.as_ref()
    }

    /// Spent outputs, in input order
    pub fn prevouts(&self) -> &[TxOut] {
        &self.prevouts
    }

    pub fn unsigned_transaction(&self) -> &Transaction {
        &self.unsigned_tx
    }

    pub fn unsigned_txid(&self) -> Txid {
        self.unsigned_tx.compute_txid()
    }

    pub fn unsigned_hex(&self) -> String {
        serialize_hex(&self.unsigned_tx)
    }

    pub fn output_scripts(&self) -> Vec<ScriptBuf> {
        self.unsigned_tx
            .output
            .iter()
            .map(|o| o.script_pubkey.clone())
            .collect()
    }

    pub fn fee(&self) -> u64 {
        self.plan.fee
    }

    /// Digest the post-quantum co-signer signs, when one is required
    pub fn quantum_digest(&self) -> Option<[u8; 32]> {
        let pre = self.state.precomputed.as_ref()?;
        pre.quantum_key_hash?;
        let mut engine = sha256::Hash::engine();
        engine.input(QUANTUM_DIGEST_TAG);
        engine.input(self.unsigned_txid().as_byte_array());
        engine.input(&pre.script_commitment);
        Some(sha256::Hash::from_engine(engine).to_byte_array())
    }
}

/// Rebuilds unsigned transactions from states
pub struct Reconstructor;

impl Reconstructor {
    pub fn reconstruct(
        state: &SerializedTransactionState,
        capability: &SignerCapability,
    ) -> OfflineResult<TransactionBuilder> {
        Self::reconstruct_with_settings(state, capability, &OfflineSettings::default())
    }

    pub fn reconstruct_with_settings(
        state: &SerializedTransactionState,
        capability: &SignerCapability,
        settings: &OfflineSettings,
    ) -> OfflineResult<TransactionBuilder> {
        state.verify_checksum()?;
        state.validate(settings)?;
        check_quantum_signer(state, capability)?;

        let secp = Secp256k1::verification_only();
        let pubkey = capability.public_key();
        let plan = plan_fees(state)?;

        check_owned_inputs(state, &plan, &pubkey)?;

        let commitment = match &state.precomputed {
            Some(pre) => {
                let commitment =
                    scripts::commitment(&secp, &pubkey, &pre.random_bytes, &pre.compiled_target_script)?;
                if !bool::from(commitment.leaf_hash.ct_eq(&pre.script_commitment)) {
                    return Err(OfflineError::script_mismatch(format!(
                        "commitment {} does not match recorded {}",
                        hex::encode(commitment.leaf_hash),
                        hex::encode(pre.script_commitment)
                    )));
                }
                Some(commitment)
            }
            None => None,
        };

        let input = state
            .utxos
            .iter()
            .map(|utxo| TxIn {
                previous_output: utxo.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            })
            .collect();

        let output = plan
            .outputs
            .iter()
            .map(|planned| {
                let script_pubkey = match &planned.template {
                    OutputTemplate::Script(script) => Ok(script.clone()),
                    OutputTemplate::Commitment => commitment
                        .as_ref()
                        .map(|c| c.script_pubkey.clone())
                        .ok_or_else(|| OfflineError::corrupt("commitment output without precomputed data")),
                }?;
                Ok(TxOut {
                    value: Amount::from_sat(planned.value),
                    script_pubkey,
                })
            })
            .collect::<OfflineResult<Vec<_>>>()?;

        let unsigned_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        };

        let prevouts = state
            .utxos
            .iter()
            .map(|utxo| TxOut {
                value: Amount::from_sat(utxo.value),
                script_pubkey: ScriptBuf::from_bytes(utxo.script_pubkey.clone()),
            })
            .collect();

        let builder = TransactionBuilder {
            state: state.clone(),
            capability: capability.clone(),
            plan,
            commitment,
            prevouts,
            unsigned_tx,
        };

        log_info!(
            "builder",
            "Transaction reconstructed",
            kind = format!("{:?}", state.transaction_type),
            inputs = builder.unsigned_tx.input.len(),
            outputs = builder.unsigned_tx.output.len(),
            fee = builder.plan.fee,
            txid = builder.unsigned_txid()
        );
        Ok(builder)
    }
}

/// Rebuild the unsigned transaction `state` describes
pub fn reconstruct(
    state: &SerializedTransactionState,
    capability: &SignerCapability,
) -> OfflineResult<TransactionBuilder> {
    Reconstructor::reconstruct(state, capability)
}

/// Owned inputs must pay to the signer key through the path their shape implies
pub(crate) fn check_owned_inputs(
    state: &SerializedTransactionState,
    plan: &FeePlan,
    pubkey: &PublicKey,
) -> OfflineResult<()> {
    if state.multisig.is_some() {
        return Ok(());
    }
    let secp = Secp256k1::verification_only();
    let taproot = scripts::p2tr_key_path(&secp, pubkey);
    let segwit = scripts::p2wpkh(pubkey);
    for (i, (utxo, kind)) in state.utxos.iter().zip(&plan.input_kinds).enumerate() {
        let expected = match kind {
            InputKind::TaprootKeyPath => &taproot,
            _ => &segwit,
        };
        if utxo.script_pubkey != expected.as_bytes() {
            return Err(OfflineError::script_mismatch(format!(
                "input {} is not spendable by the signer key",
                i
            )));
        }
    }
    Ok(())
}

fn check_quantum_signer(state: &SerializedTransactionState, capability: &SignerCapability) -> OfflineResult<()> {
    let Some(expected) = state.precomputed.as_ref().and_then(|p| p.quantum_key_hash) else {
        return Ok(());
    };
    let quantum = capability.quantum_signer().ok_or_else(|| {
        OfflineError::MissingRequiredSigner("state requires a post-quantum co-signer".to_string())
    })?;
    let actual = sha256::Hash::hash(&quantum.public_key()).to_byte_array();
    if !bool::from(actual.ct_eq(&expected)) {
        return Err(OfflineError::UnknownSigner(format!(
            "post-quantum key {} is not the required co-signer",
            hex::encode(actual)
        )));
    }
    Ok(())
}
