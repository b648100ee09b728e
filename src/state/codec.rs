//! State codec
//!
//! Deterministic binary encoding of [`SerializedTransactionState`] plus the
//! hex and base64 transport forms. Decoding verifies integrity before it
//! trusts any structure: checksum, magic, versions, then layout and
//! invariants.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::PublicKey;
use subtle::ConstantTimeEq;

use crate::error::{OfflineError, OfflineResult};
use crate::types::{NetworkKind, TransactionType};
use crate::utils::config::OfflineSettings;
use crate::{log_debug, log_warn};

use super::types::*;
use super::wire::{WireReader, WireWriter};
use super::{CHECKSUM_LEN, CONSENSUS_VERSION, FORMAT_VERSION, MAGIC_BYTE};

/// Fixed header plus an empty base block, a UTXO count and the checksum
pub const MIN_ENCODED_LEN: usize = 1 + 4 + 4 + 1 + 4 + 8 + 4 + 4 + CHECKSUM_LEN;

/// Smallest encoded UTXO: txid, index, value, empty script
const MIN_UTXO_LEN: usize = 32 + 4 + 8 + 4;

const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Encoder and decoder for transaction states
pub struct StateCodec;

impl StateCodec {
    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encode a state, appending a checksum computed over the encoded fields
    pub fn encode(state: &SerializedTransactionState) -> Vec<u8> {
        let mut bytes = Self::encode_body(state);
        let checksum = Self::compute_checksum(&bytes);
        bytes.extend_from_slice(&checksum);
        bytes
    }

    /// Every field except the trailing checksum
    pub(crate) fn encode_body(state: &SerializedTransactionState) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_u8(state.magic);
        w.put_u32(state.format_version);
        w.put_u32(state.consensus_version);
        w.put_u8(state.transaction_type.tag());
        w.put_u32(state.chain_id);
        w.put_u64(state.timestamp);

        let base = &state.base_params;
        let mut block = WireWriter::new();
        block.put_str(&base.from);
        block.put_str(&base.to);
        block.put_f64(base.fee_rate);
        block.put_u64(base.priority_fee);
        block.put_u64(base.gas_sat_fee);
        block.put_u64(base.amount);
        block.put_u8(base.network.tag());
        w.put_block(block);

        w.put_u32(state.utxos.len() as u32);
        for utxo in &state.utxos {
            w.put_fixed(&utxo.txid);
            w.put_u32(utxo.output_index);
            w.put_u64(utxo.value);
            w.put_bytes(&utxo.script_pubkey);
        }

        if let Some(pre) = &state.precomputed {
            w.put_bytes(&pre.compiled_target_script);
            w.put_fixed(&pre.random_bytes);
            w.put_fixed(&pre.script_commitment);
            match &pre.quantum_key_hash {
                Some(hash) => {
                    w.put_u8(1);
                    w.put_fixed(hash);
                }
                None => w.put_u8(0),
            }
        }

        if let Some(ms) = &state.multisig {
            w.put_u32(ms.pubkeys.len() as u32);
            for pk in &ms.pubkeys {
                w.put_fixed(&pk.serialize());
            }
            w.put_u32(ms.minimum_signatures);
            w.put_u32(ms.collected_signatures.len() as u32);
            // BTreeMap iteration is ascending by signer index
            for (index, partial) in &ms.collected_signatures {
                w.put_u32(*index);
                w.put_u32(partial.input_signatures.len() as u32);
                for sig in &partial.input_signatures {
                    w.put_bytes(sig);
                }
            }
            w.put_str(&ms.refund_vault);
            w.put_u64(ms.requested_amount);
            w.put_str(&ms.receiver);
        }

        match &state.extension {
            Some(ExtensionData::CustomScript { witness_script }) => w.put_bytes(witness_script),
            Some(ExtensionData::Cancel { replaced_txid }) => w.put_fixed(replaced_txid),
            None => {}
        }

        w.into_bytes()
    }

    pub fn compute_checksum(body: &[u8]) -> [u8; 32] {
        sha256d::Hash::hash(body).to_byte_array()
    }

    /// Constant-time checksum comparison
    pub(crate) fn compare_checksum(expected: &[u8; 32], actual: &[u8; 32]) -> OfflineResult<()> {
        if bool::from(expected.ct_eq(actual)) {
            Ok(())
        } else {
            Err(OfflineError::ChecksumMismatch {
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            })
        }
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode with the standard settings
    pub fn decode(bytes: &[u8]) -> OfflineResult<SerializedTransactionState> {
        Self::decode_with_settings(bytes, &OfflineSettings::default())
    }

    pub fn decode_with_settings(
        bytes: &[u8],
        settings: &OfflineSettings,
    ) -> OfflineResult<SerializedTransactionState> {
        match Self::decode_inner(bytes, settings) {
            Ok(state) => {
                log_debug!(
                    "state",
                    "State decoded",
                    kind = format!("{:?}", state.transaction_type),
                    utxos = state.utxos.len(),
                    checksum = hex::encode(state.checksum)
                );
                Ok(state)
            }
            Err(e) => {
                log_warn!("state", "State rejected", code = format!("{:?}", e.code()), len = bytes.len());
                Err(e)
            }
        }
    }

    fn decode_inner(bytes: &[u8], settings: &OfflineSettings) -> OfflineResult<SerializedTransactionState> {
        if bytes.len() < MIN_ENCODED_LEN {
            return Err(OfflineError::corrupt(format!(
                "{} bytes is shorter than the minimum state of {}",
                bytes.len(),
                MIN_ENCODED_LEN
            )));
        }

        let (body, stored) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(stored);
        Self::compare_checksum(&checksum, &Self::compute_checksum(body))?;

        let mut r = WireReader::new(body, settings.max_script_bytes);

        let magic = r.get_u8("magic")?;
        if magic != MAGIC_BYTE {
            return Err(OfflineError::corrupt(format!("bad magic byte 0x{:02x}", magic)));
        }
        let format_version = r.get_u32("format version")?;
        if format_version == 0 || format_version > FORMAT_VERSION {
            return Err(OfflineError::UnsupportedVersion {
                field: "format",
                found: format_version,
                supported: FORMAT_VERSION,
            });
        }
        let consensus_version = r.get_u32("consensus version")?;
        if consensus_version == 0 || consensus_version > CONSENSUS_VERSION {
            return Err(OfflineError::UnsupportedVersion {
                field: "consensus",
                found: consensus_version,
                supported: CONSENSUS_VERSION,
            });
        }

        let transaction_type = TransactionType::from_tag(r.get_u8("transaction type")?)?;
        let chain_id = r.get_u32("chain id")?;
        let timestamp = r.get_u64("timestamp")?;
        let base_params = Self::read_base_params(&mut r)?;

        let count = r.get_count("utxo", MIN_UTXO_LEN, settings.max_utxos)?;
        let mut utxos = Vec::with_capacity(count);
        for _ in 0..count {
            utxos.push(StateUtxo {
                txid: r.get_array32("utxo txid")?,
                output_index: r.get_u32("utxo index")?,
                value: r.get_u64("utxo value")?,
                script_pubkey: r.get_bytes("utxo script")?,
            });
        }

        let precomputed = if transaction_type.requires_precomputed() {
            Some(Self::read_precomputed(&mut r)?)
        } else {
            None
        };

        let multisig = if transaction_type.requires_multisig() {
            Some(Self::read_multisig(&mut r, settings)?)
        } else {
            None
        };

        let extension = match transaction_type {
            TransactionType::CustomScript => Some(ExtensionData::CustomScript {
                witness_script: r.get_bytes("witness script")?,
            }),
            TransactionType::Cancel => Some(ExtensionData::Cancel {
                replaced_txid: r.get_array32("replaced txid")?,
            }),
            _ => None,
        };

        r.finish("state")?;

        let state = SerializedTransactionState {
            magic,
            format_version,
            consensus_version,
            transaction_type,
            chain_id,
            timestamp,
            base_params,
            utxos,
            precomputed,
            multisig,
            extension,
            checksum,
        };
        state.validate(settings)?;
        Ok(state)
    }

    fn read_base_params(r: &mut WireReader<'_>) -> OfflineResult<BaseParams> {
        let mut block = r.get_block("base params")?;
        let params = BaseParams {
            from: block.get_str("from")?,
            to: block.get_str("to")?,
            fee_rate: block.get_f64("fee rate")?,
            priority_fee: block.get_u64("priority fee")?,
            gas_sat_fee: block.get_u64("gas fee")?,
            amount: block.get_u64("amount")?,
            network: NetworkKind::from_tag(block.get_u8("network")?)?,
        };
        block.finish("base params")?;
        Ok(params)
    }

    fn read_precomputed(r: &mut WireReader<'_>) -> OfflineResult<PrecomputedData> {
        let compiled_target_script = r.get_bytes("compiled target script")?;
        let random_bytes = r.get_array32("random bytes")?;
        let script_commitment = r.get_array32("script commitment")?;
        let quantum_key_hash = match r.get_u8("quantum flag")? {
            0 => None,
            1 => Some(r.get_array32("quantum key hash")?),
            other => return Err(OfflineError::corrupt(format!("quantum flag {} is not 0 or 1", other))),
        };
        Ok(PrecomputedData {
            compiled_target_script,
            random_bytes,
            script_commitment,
            quantum_key_hash,
        })
    }

    fn read_multisig(r: &mut WireReader<'_>, settings: &OfflineSettings) -> OfflineResult<MultisigData> {
        let key_count = r.get_count("multisig key", COMPRESSED_PUBKEY_LEN, settings.max_pubkeys)?;
        let mut pubkeys = Vec::with_capacity(key_count);
        for i in 0..key_count {
            let raw = r.get_fixed(COMPRESSED_PUBKEY_LEN, "multisig key")?;
            let pk = PublicKey::from_slice(raw)
                .map_err(|e| OfflineError::corrupt(format!("multisig key {}: {}", i, e)))?;
            pubkeys.push(pk);
        }
        let minimum_signatures = r.get_u32("minimum signatures")?;

        let mut data = MultisigData::new(pubkeys, minimum_signatures);
        let entries = r.get_count("signature entry", 8, settings.max_pubkeys)?;
        let mut last: Option<u32> = None;
        for _ in 0..entries {
            let index = r.get_u32("signer index")?;
            if last.map_or(false, |prev| index <= prev) {
                return Err(OfflineError::corrupt(format!(
                    "signer index {} is not strictly ascending",
                    index
                )));
            }
            last = Some(index);

            let sig_count = r.get_count("input signature", 4, settings.max_utxos)?;
            let mut input_signatures = Vec::with_capacity(sig_count);
            for _ in 0..sig_count {
                input_signatures.push(r.get_bytes("signature")?);
            }
            data.collected_signatures.insert(index, PartialSignature { input_signatures });
        }

        data.refund_vault = r.get_str("refund vault")?;
        data.requested_amount = r.get_u64("requested amount")?;
        data.receiver = r.get_str("receiver")?;
        Ok(data)
    }

    // =========================================================================
    // Transport forms
    // =========================================================================

    pub fn to_hex(state: &SerializedTransactionState) -> String {
        hex::encode(Self::encode(state))
    }

    pub fn from_hex(text: &str) -> OfflineResult<SerializedTransactionState> {
        let bytes = hex::decode(text.trim())?;
        Self::decode(&bytes)
    }

    pub fn to_base64(state: &SerializedTransactionState) -> String {
        BASE64.encode(Self::encode(state))
    }

    pub fn from_base64(text: &str) -> OfflineResult<SerializedTransactionState> {
        let bytes = BASE64.decode(text.trim())?;
        Self::decode(&bytes)
    }
}

/// Encode a state to its binary form
pub fn encode(state: &SerializedTransactionState) -> Vec<u8> {
    StateCodec::encode(state)
}

/// Decode and verify a binary state
pub fn decode(bytes: &[u8]) -> OfflineResult<SerializedTransactionState> {
    StateCodec::decode(bytes)
}
