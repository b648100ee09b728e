//! Transaction state data model
//!
//! A [`SerializedTransactionState`] is everything an offline machine needs
//! to rebuild the exact unsigned transaction the online machine planned.
//! States are treated as values: every transform returns a new state with a
//! freshly computed checksum.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::PublicKey;
use bitcoin::{OutPoint, Txid};
use serde::Serialize;

use crate::error::{OfflineError, OfflineResult};
use crate::types::{NetworkKind, TransactionType};
use crate::utils::config::OfflineSettings;

use super::codec::StateCodec;
use super::{CONSENSUS_VERSION, FORMAT_VERSION, MAGIC_BYTE};

// =============================================================================
// Base Parameters
// =============================================================================

/// Parameters common to every transaction type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseParams {
    /// Sender address; change (or the whole cancel output) returns here
    pub from: String,
    /// Recipient address, empty when the type has no recipient
    pub to: String,
    /// Fee rate in sat/vB
    pub fee_rate: f64,
    /// Priority fee funded into the commitment output
    pub priority_fee: u64,
    /// Execution fee funded into the commitment output
    pub gas_sat_fee: u64,
    /// Amount sent to the recipient
    pub amount: u64,
    pub network: NetworkKind,
}

impl BaseParams {
    pub fn new(from: impl Into<String>, to: impl Into<String>, network: NetworkKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            fee_rate: 1.0,
            priority_fee: 0,
            gas_sat_fee: 0,
            amount: 0,
            network,
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_fees(mut self, priority_fee: u64, gas_sat_fee: u64) -> Self {
        self.priority_fee = priority_fee;
        self.gas_sat_fee = gas_sat_fee;
        self
    }
}

// =============================================================================
// UTXOs
// =============================================================================

/// A spendable output the transaction consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUtxo {
    /// Transaction id in internal byte order
    pub txid: [u8; 32],
    pub output_index: u32,
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl StateUtxo {
    /// Build from the display form used by explorers and node RPCs
    pub fn from_display(txid: &str, output_index: u32, value: u64, script_hex: &str) -> OfflineResult<Self> {
        let txid = Txid::from_str(txid)
            .map_err(|e| OfflineError::invalid_input(format!("txid: {}", e)))?;
        Ok(Self {
            txid: txid.to_byte_array(),
            output_index,
            value,
            script_pubkey: hex::decode(script_hex)?,
        })
    }

    pub fn txid(&self) -> Txid {
        Txid::from_byte_array(self.txid)
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid(), self.output_index)
    }
}

// =============================================================================
// Type-specific blocks
// =============================================================================

/// Precomputed script data for Deployment and Interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecomputedData {
    /// Compiled target script produced by the external compiler
    pub compiled_target_script: Vec<u8>,
    /// Salt mixed into the commitment leaf
    pub random_bytes: [u8; 32],
    /// TapLeaf hash of the commitment leaf
    pub script_commitment: [u8; 32],
    /// SHA-256 of the required post-quantum co-signer public key
    pub quantum_key_hash: Option<[u8; 32]>,
}

/// Signatures contributed by one multisig participant, one per UTXO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSignature {
    /// DER signature plus sighash byte, indexed like the state's UTXOs
    pub input_signatures: Vec<Vec<u8>>,
}

/// Multisig coordination block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigData {
    /// Participant keys in witness-script order
    pub pubkeys: Vec<PublicKey>,
    pub minimum_signatures: u32,
    /// Signer index -> contribution; keyed map keeps indices ordered and unique
    pub collected_signatures: BTreeMap<u32, PartialSignature>,
    pub refund_vault: String,
    pub requested_amount: u64,
    pub receiver: String,
}

impl MultisigData {
    pub fn new(pubkeys: Vec<PublicKey>, minimum_signatures: u32) -> Self {
        Self {
            pubkeys,
            minimum_signatures,
            collected_signatures: BTreeMap::new(),
            refund_vault: String::new(),
            requested_amount: 0,
            receiver: String::new(),
        }
    }

    pub fn collected(&self) -> u32 {
        self.collected_signatures.len() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.collected() >= self.minimum_signatures
    }

    /// Position of `pubkey` in the signer set
    pub fn signer_index(&self, pubkey: &PublicKey) -> Option<u32> {
        self.pubkeys.iter().position(|pk| pk == pubkey).map(|i| i as u32)
    }
}

/// Extension data for types that carry one extra field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionData {
    /// Witness script the CustomScript output is locked to
    CustomScript { witness_script: Vec<u8> },
    /// Transaction a Cancel replaces, internal byte order
    Cancel { replaced_txid: [u8; 32] },
}

// =============================================================================
// State
// =============================================================================

/// Portable in-flight transaction state
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedTransactionState {
    pub magic: u8,
    pub format_version: u32,
    pub consensus_version: u32,
    pub transaction_type: TransactionType,
    pub chain_id: u32,
    /// Unix milliseconds
    pub timestamp: u64,
    pub base_params: BaseParams,
    pub utxos: Vec<StateUtxo>,
    pub precomputed: Option<PrecomputedData>,
    pub multisig: Option<MultisigData>,
    pub extension: Option<ExtensionData>,
    /// SHA-256d over the encoding of every preceding field
    pub checksum: [u8; 32],
}

impl SerializedTransactionState {
    /// New state at the current format and consensus versions, not yet sealed
    pub fn new(
        transaction_type: TransactionType,
        chain_id: u32,
        timestamp: u64,
        base_params: BaseParams,
        utxos: Vec<StateUtxo>,
    ) -> Self {
        Self {
            magic: MAGIC_BYTE,
            format_version: FORMAT_VERSION,
            consensus_version: CONSENSUS_VERSION,
            transaction_type,
            chain_id,
            timestamp,
            base_params,
            utxos,
            precomputed: None,
            multisig: None,
            extension: None,
            checksum: [0u8; 32],
        }
    }

    /// Recompute the checksum over the current field values
    pub fn seal(mut self) -> Self {
        self.checksum = StateCodec::compute_checksum(&StateCodec::encode_body(&self));
        self
    }

    /// Whether the stored checksum matches the field values
    pub fn verify_checksum(&self) -> OfflineResult<()> {
        let actual = StateCodec::compute_checksum(&StateCodec::encode_body(self));
        StateCodec::compare_checksum(&self.checksum, &actual)
    }

    pub fn total_input_value(&self) -> OfflineResult<u64> {
        self.utxos.iter().try_fold(0u64, |acc, utxo| {
            acc.checked_add(utxo.value)
                .ok_or_else(|| OfflineError::corrupt("UTXO values overflow"))
        })
    }

    pub fn multisig(&self) -> OfflineResult<&MultisigData> {
        self.multisig
            .as_ref()
            .ok_or_else(|| OfflineError::invalid_input("state is not a multisig state"))
    }

    pub fn precomputed(&self) -> OfflineResult<&PrecomputedData> {
        self.precomputed
            .as_ref()
            .ok_or_else(|| OfflineError::corrupt("missing precomputed block"))
    }

    /// Check every structural invariant a decoded state must satisfy
    pub fn validate(&self, settings: &OfflineSettings) -> OfflineResult<()> {
        if self.magic != MAGIC_BYTE {
            return Err(OfflineError::corrupt(format!("bad magic byte 0x{:02x}", self.magic)));
        }
        if self.format_version > FORMAT_VERSION || self.format_version == 0 {
            return Err(OfflineError::UnsupportedVersion {
                field: "format",
                found: self.format_version,
                supported: FORMAT_VERSION,
            });
        }
        if self.consensus_version > CONSENSUS_VERSION || self.consensus_version == 0 {
            return Err(OfflineError::UnsupportedVersion {
                field: "consensus",
                found: self.consensus_version,
                supported: CONSENSUS_VERSION,
            });
        }

        let ty = self.transaction_type;
        if ty.requires_precomputed() != self.precomputed.is_some() {
            return Err(OfflineError::corrupt(format!("precomputed block presence does not match {:?}", ty)));
        }
        if ty.requires_multisig() != self.multisig.is_some() {
            return Err(OfflineError::corrupt(format!("multisig block presence does not match {:?}", ty)));
        }
        match (ty, &self.extension) {
            (TransactionType::CustomScript, Some(ExtensionData::CustomScript { .. }))
            | (TransactionType::Cancel, Some(ExtensionData::Cancel { .. })) => {}
            (_, None) if !ty.requires_extension() => {}
            _ => {
                return Err(OfflineError::corrupt(format!("extension block does not match {:?}", ty)));
            }
        }

        let fee_rate = self.base_params.fee_rate;
        if !fee_rate.is_finite() || fee_rate <= 0.0 {
            return Err(OfflineError::corrupt(format!("fee rate {} is not positive", fee_rate)));
        }

        if self.utxos.is_empty() {
            return Err(OfflineError::corrupt("state has no UTXOs"));
        }
        if self.utxos.len() > settings.max_utxos {
            return Err(OfflineError::corrupt(format!(
                "{} UTXOs exceeds limit of {}",
                self.utxos.len(),
                settings.max_utxos
            )));
        }
        let mut seen = HashSet::new();
        for utxo in &self.utxos {
            if !seen.insert((utxo.txid, utxo.output_index)) {
                return Err(OfflineError::corrupt(format!("UTXO {} listed twice", utxo.outpoint())));
            }
            check_len("script_pubkey", utxo.script_pubkey.len(), settings)?;
        }
        self.total_input_value()?;

        check_len("from", self.base_params.from.len(), settings)?;
        check_len("to", self.base_params.to.len(), settings)?;

        if let Some(pre) = &self.precomputed {
            check_len("compiled target script", pre.compiled_target_script.len(), settings)?;
        }
        if let Some(ExtensionData::CustomScript { witness_script }) = &self.extension {
            if witness_script.is_empty() {
                return Err(OfflineError::corrupt("empty custom witness script"));
            }
            check_len("witness script", witness_script.len(), settings)?;
        }
        if let Some(ms) = &self.multisig {
            self.validate_multisig(ms, settings)?;
        }
        Ok(())
    }

    fn validate_multisig(&self, ms: &MultisigData, settings: &OfflineSettings) -> OfflineResult<()> {
        let n = ms.pubkeys.len();
        if n == 0 || n > settings.max_pubkeys {
            return Err(OfflineError::corrupt(format!(
                "{} multisig keys outside 1..={}",
                n, settings.max_pubkeys
            )));
        }
        if ms.minimum_signatures == 0 || ms.minimum_signatures as usize > n {
            return Err(OfflineError::corrupt(format!(
                "threshold {} invalid for {} keys",
                ms.minimum_signatures, n
            )));
        }
        let unique: HashSet<_> = ms.pubkeys.iter().collect();
        if unique.len() != n {
            return Err(OfflineError::corrupt("duplicate multisig public key"));
        }
        check_len("refund vault", ms.refund_vault.len(), settings)?;
        check_len("receiver", ms.receiver.len(), settings)?;

        for (index, partial) in &ms.collected_signatures {
            if *index as usize >= n {
                return Err(OfflineError::corrupt(format!("signer index {} out of range", index)));
            }
            if partial.input_signatures.len() != self.utxos.len() {
                return Err(OfflineError::corrupt(format!(
                    "signer {} has {} signatures for {} inputs",
                    index,
                    partial.input_signatures.len(),
                    self.utxos.len()
                )));
            }
            for sig in &partial.input_signatures {
                if sig.is_empty() || sig.len() > 73 {
                    return Err(OfflineError::corrupt(format!("signer {} has a malformed signature", index)));
                }
            }
        }
        Ok(())
    }
}

fn check_len(what: &str, len: usize, settings: &OfflineSettings) -> OfflineResult<()> {
    if len > settings.max_script_bytes {
        return Err(OfflineError::corrupt(format!(
            "{} length {} exceeds limit of {}",
            what, len, settings.max_script_bytes
        )));
    }
    Ok(())
}
