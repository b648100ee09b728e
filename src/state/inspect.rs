//! Validation and inspection of untrusted state bytes
//!
//! [`inspect`] is a read-only projection for display and logging. It never
//! feeds back into signing.

use bitcoin::hashes::Hash;
use serde::Serialize;

use crate::error::{OfflineError, OfflineResult};
use crate::types::{NetworkKind, TransactionType};

use super::codec::StateCodec;
use super::types::{ExtensionData, SerializedTransactionState};

/// True iff `bytes` decode as a well-formed state
pub fn validate(bytes: &[u8]) -> bool {
    StateCodec::decode(bytes).is_ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct UtxoSummary {
    pub txid: String,
    pub output_index: u32,
    pub value: u64,
    pub script_pubkey: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrecomputedSummary {
    pub compiled_script_len: usize,
    pub compiled_target_script: String,
    pub random_bytes: String,
    pub script_commitment: String,
    pub requires_quantum_signer: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultisigSummary {
    pub pubkeys: Vec<String>,
    pub minimum_signatures: u32,
    pub signed_indices: Vec<u32>,
    pub refund_vault: String,
    pub requested_amount: u64,
    pub receiver: String,
}

/// Human-readable view of a state
#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub format_version: u32,
    pub consensus_version: u32,
    pub transaction_type: TransactionType,
    pub chain_id: u32,
    pub timestamp: u64,
    pub created_at: Option<String>,
    pub network: NetworkKind,
    pub from: String,
    pub to: String,
    pub fee_rate: f64,
    pub priority_fee: u64,
    pub gas_sat_fee: u64,
    pub amount: u64,
    pub total_input: u64,
    pub utxos: Vec<UtxoSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precomputed: Option<PrecomputedSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multisig: Option<MultisigSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_txid: Option<String>,
    pub checksum: String,
}

impl StateSummary {
    pub fn from_state(state: &SerializedTransactionState) -> OfflineResult<Self> {
        let base = &state.base_params;
        let created_at = chrono::DateTime::from_timestamp_millis(state.timestamp as i64)
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));

        let (witness_script, replaced_txid) = match &state.extension {
            Some(ExtensionData::CustomScript { witness_script }) => (Some(hex::encode(witness_script)), None),
            Some(ExtensionData::Cancel { replaced_txid }) => {
                let txid = bitcoin::Txid::from_byte_array(*replaced_txid);
                (None, Some(txid.to_string()))
            }
            None => (None, None),
        };

        Ok(Self {
            format_version: state.format_version,
            consensus_version: state.consensus_version,
            transaction_type: state.transaction_type,
            chain_id: state.chain_id,
            timestamp: state.timestamp,
            created_at,
            network: base.network,
            from: base.from.clone(),
            to: base.to.clone(),
            fee_rate: base.fee_rate,
            priority_fee: base.priority_fee,
            gas_sat_fee: base.gas_sat_fee,
            amount: base.amount,
            total_input: state.total_input_value()?,
            utxos: state
                .utxos
                .iter()
                .map(|u| UtxoSummary {
                    txid: u.txid().to_string(),
                    output_index: u.output_index,
                    value: u.value,
                    script_pubkey: hex::encode(&u.script_pubkey),
                })
                .collect(),
            precomputed: state.precomputed.as_ref().map(|p| PrecomputedSummary {
                compiled_script_len: p.compiled_target_script.len(),
                compiled_target_script: hex::encode(&p.compiled_target_script),
                random_bytes: hex::encode(p.random_bytes),
                script_commitment: hex::encode(p.script_commitment),
                requires_quantum_signer: p.quantum_key_hash.is_some(),
            }),
            multisig: state.multisig.as_ref().map(|m| MultisigSummary {
                pubkeys: m.pubkeys.iter().map(|pk| pk.to_string()).collect(),
                minimum_signatures: m.minimum_signatures,
                signed_indices: m.collected_signatures.keys().copied().collect(),
                refund_vault: m.refund_vault.clone(),
                requested_amount: m.requested_amount,
                receiver: m.receiver.clone(),
            }),
            witness_script,
            replaced_txid,
            checksum: hex::encode(state.checksum),
        })
    }

    pub fn to_json(&self) -> OfflineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| OfflineError::Encoding(e.to_string()))
    }
}

/// Decode `bytes` and project them for display
pub fn inspect(bytes: &[u8]) -> OfflineResult<StateSummary> {
    let state = StateCodec::decode(bytes)?;
    StateSummary::from_state(&state)
}
