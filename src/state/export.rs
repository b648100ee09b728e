//! State export (online side)
//!
//! Builds a sealed state from parameters gathered on the networked
//! machine. Export runs the same fee plan the offline reconstructor runs,
//! so a state that leaves the online machine is always buildable.

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::builder::plan::plan_fees;
use crate::builder::reconstruct::check_owned_inputs;
use crate::builder::scripts;
use crate::error::{OfflineError, OfflineResult};
use crate::log_info;
use crate::types::TransactionType;
use crate::utils::config::OfflineSettings;

use super::types::*;

/// Participants and payout of a multisig spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigSetup {
    pub pubkeys: Vec<PublicKey>,
    pub minimum_signatures: u32,
    pub refund_vault: String,
    pub requested_amount: u64,
    pub receiver: String,
}

/// Everything the online machine knows about a transaction to be signed
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub transaction_type: TransactionType,
    pub chain_id: u32,
    pub base_params: BaseParams,
    pub utxos: Vec<StateUtxo>,
    /// Output of the external script compiler (Deployment, Interaction)
    pub compiled_target_script: Option<Vec<u8>>,
    /// Commitment salt; drawn from the OS RNG when absent
    pub random_bytes: Option<[u8; 32]>,
    /// Public key of a required post-quantum co-signer
    pub quantum_public_key: Option<Vec<u8>>,
    pub multisig: Option<MultisigSetup>,
    /// Witness script for CustomScript
    pub witness_script: Option<Vec<u8>>,
    /// Transaction a Cancel replaces, internal byte order
    pub replaced_txid: Option<[u8; 32]>,
}

impl ExportRequest {
    pub fn new(transaction_type: TransactionType, base_params: BaseParams, utxos: Vec<StateUtxo>) -> Self {
        Self {
            transaction_type,
            chain_id: 0,
            base_params,
            utxos,
            compiled_target_script: None,
            random_bytes: None,
            quantum_public_key: None,
            multisig: None,
            witness_script: None,
            replaced_txid: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u32) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_compiled_script(mut self, script: Vec<u8>) -> Self {
        self.compiled_target_script = Some(script);
        self
    }

    pub fn with_random_bytes(mut self, random_bytes: [u8; 32]) -> Self {
        self.random_bytes = Some(random_bytes);
        self
    }

    pub fn with_quantum_key(mut self, public_key: Vec<u8>) -> Self {
        self.quantum_public_key = Some(public_key);
        self
    }

    pub fn with_multisig(mut self, setup: MultisigSetup) -> Self {
        self.multisig = Some(setup);
        self
    }

    pub fn with_witness_script(mut self, script: Vec<u8>) -> Self {
        self.witness_script = Some(script);
        self
    }

    pub fn with_replaced_txid(mut self, txid: [u8; 32]) -> Self {
        self.replaced_txid = Some(txid);
        self
    }
}

/// Export with the standard settings
pub fn export(request: &ExportRequest, public_key: &PublicKey) -> OfflineResult<SerializedTransactionState> {
    export_with_settings(request, public_key, &OfflineSettings::default())
}

/// Build and seal a state for `request`
///
/// `public_key` is the offline signer's key; it owns the inputs and keys
/// the commitment output. MultiSig states take their keys from the setup.
pub fn export_with_settings(
    request: &ExportRequest,
    public_key: &PublicKey,
    settings: &OfflineSettings,
) -> OfflineResult<SerializedTransactionState> {
    settings.check_fee_rate(request.base_params.fee_rate)?;
    if request.utxos.is_empty() {
        return Err(OfflineError::invalid_input("no UTXOs to spend"));
    }

    let ty = request.transaction_type;
    let timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut state = SerializedTransactionState::new(
        ty,
        request.chain_id,
        timestamp,
        request.base_params.clone(),
        request.utxos.clone(),
    );

    if ty.requires_precomputed() {
        let compiled = request
            .compiled_target_script
            .clone()
            .ok_or_else(|| OfflineError::invalid_input(format!("{:?} requires a compiled target script", ty)))?;
        let random_bytes = request.random_bytes.unwrap_or_else(|| {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            bytes
        });
        let secp = Secp256k1::verification_only();
        let commitment = scripts::commitment(&secp, public_key, &random_bytes, &compiled)?;
        state.precomputed = Some(PrecomputedData {
            compiled_target_script: compiled,
            random_bytes,
            script_commitment: commitment.leaf_hash,
            quantum_key_hash: request
                .quantum_public_key
                .as_ref()
                .map(|pk| sha256::Hash::hash(pk).to_byte_array()),
        });
    } else if request.quantum_public_key.is_some() {
        return Err(OfflineError::invalid_input(format!(
            "{:?} cannot require a post-quantum co-signer",
            ty
        )));
    }

    if ty == TransactionType::MultiSig {
        let setup = request
            .multisig
            .as_ref()
            .ok_or_else(|| OfflineError::invalid_input("MultiSig requires a multisig setup"))?;
        let mut data = MultisigData::new(setup.pubkeys.clone(), setup.minimum_signatures);
        data.refund_vault = setup.refund_vault.clone();
        data.requested_amount = setup.requested_amount;
        data.receiver = setup.receiver.clone();
        state.multisig = Some(data);
    }

    state.extension = match ty {
        TransactionType::CustomScript => Some(ExtensionData::CustomScript {
            witness_script: request
                .witness_script
                .clone()
                .ok_or_else(|| OfflineError::invalid_input("CustomScript requires a witness script"))?,
        }),
        TransactionType::Cancel => Some(ExtensionData::Cancel {
            replaced_txid: request
                .replaced_txid
                .ok_or_else(|| OfflineError::invalid_input("Cancel requires the replaced txid"))?,
        }),
        _ => None,
    };

    state.validate(settings).map_err(|e| match e {
        OfflineError::CorruptState(msg) => OfflineError::InvalidInput(msg),
        other => other,
    })?;

    let plan = plan_fees(&state)?;
    check_owned_inputs(&state, &plan, public_key)?;

    let state = state.seal();
    log_info!(
        "state",
        "State exported",
        kind = format!("{:?}", ty),
        utxos = state.utxos.len(),
        fee = plan.fee,
        fee_rate = state.base_params.fee_rate,
        checksum = hex::encode(state.checksum)
    );
    Ok(state)
}
