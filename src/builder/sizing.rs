//! Transaction size estimation
//!
//! Weight-unit accounting for the input and output shapes the offline
//! signer produces. Non-witness bytes weigh 4 WU, witness bytes 1 WU.

use serde::Serialize;

/// Size constants (bytes unless noted)
pub struct TxSizeConstants;

impl TxSizeConstants {
    /// Version and lock time
    pub const TX_FIXED_BYTES: u64 = 8;

    /// SegWit marker and flag, in weight units
    pub const SEGWIT_MARKER_WEIGHT: u64 = 2;

    /// Outpoint, empty script_sig length and sequence
    pub const INPUT_BYTES: u64 = 36 + 1 + 4;

    /// Largest DER signature plus sighash byte
    pub const MAX_ECDSA_SIGNATURE: u64 = 73;

    /// BIP-340 signature with the default sighash
    pub const SCHNORR_SIGNATURE: u64 = 64;

    pub const COMPRESSED_PUBKEY: u64 = 33;

    /// Output value field
    pub const OUTPUT_VALUE_BYTES: u64 = 8;

    pub const WITNESS_SCALE_FACTOR: u64 = 4;
}

/// Spending path of an input, as far as its size is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InputKind {
    /// P2TR key-path spend, one Schnorr signature
    TaprootKeyPath,
    /// P2WPKH spend, signature and public key
    SegwitV0KeyHash,
    /// P2WSH m-of-n CHECKMULTISIG spend
    MultisigWitness { script_len: usize, required: usize },
}

impl InputKind {
    /// Witness size in weight units
    pub fn witness_weight(&self) -> u64 {
        match self {
            InputKind::TaprootKeyPath => 1 + 1 + TxSizeConstants::SCHNORR_SIGNATURE,
            InputKind::SegwitV0KeyHash => {
                1 + 1 + TxSizeConstants::MAX_ECDSA_SIGNATURE + 1 + TxSizeConstants::COMPRESSED_PUBKEY
            }
            InputKind::MultisigWitness { script_len, required } => {
                let items = *required as u64 + 2;
                let script_len = *script_len as u64;
                varint_len(items)
                    + 1
                    + *required as u64 * (1 + TxSizeConstants::MAX_ECDSA_SIGNATURE)
                    + varint_len(script_len)
                    + script_len
            }
        }
    }
}

/// Length of a Bitcoin compact-size integer
pub fn varint_len(n: u64) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Serialized size of an output with a script of `script_len` bytes
pub fn output_bytes(script_len: usize) -> u64 {
    let len = script_len as u64;
    TxSizeConstants::OUTPUT_VALUE_BYTES + varint_len(len) + len
}

/// Estimated weight of a SegWit transaction
pub fn estimate_weight(inputs: &[InputKind], output_script_lens: &[usize]) -> u64 {
    let base_bytes = TxSizeConstants::TX_FIXED_BYTES
        + varint_len(inputs.len() as u64)
        + varint_len(output_script_lens.len() as u64)
        + inputs.len() as u64 * TxSizeConstants::INPUT_BYTES
        + output_script_lens.iter().map(|len| output_bytes(*len)).sum::<u64>();

    let witness: u64 = inputs.iter().map(InputKind::witness_weight).sum();

    base_bytes * TxSizeConstants::WITNESS_SCALE_FACTOR + TxSizeConstants::SEGWIT_MARKER_WEIGHT + witness
}

/// Estimated virtual size, rounded up
pub fn estimate_vsize(inputs: &[InputKind], output_script_lens: &[usize]) -> u64 {
    let weight = estimate_weight(inputs, output_script_lens);
    (weight + TxSizeConstants::WITNESS_SCALE_FACTOR - 1) / TxSizeConstants::WITNESS_SCALE_FACTOR
}

/// Fee in sats for `vsize` at `fee_rate` sat/vB, rounded up
pub fn fee_for_vsize(fee_rate: f64, vsize: u64) -> u64 {
    (fee_rate * vsize as f64).ceil() as u64
}
