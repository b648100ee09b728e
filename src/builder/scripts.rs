//! Script derivation
//!
//! Every script the offline signer emits or checks is derived here from
//! state fields and the signer's public key, so export, reconstruction and
//! fee rebuild agree byte for byte.

use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::key::{CompressedPublicKey, XOnlyPublicKey};
use bitcoin::opcodes::all::{OP_CHECKMULTISIG, OP_CHECKSIG, OP_DROP, OP_ENDIF, OP_IF};
use bitcoin::opcodes::OP_FALSE;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{PublicKey, Secp256k1, Verification};
use bitcoin::taproot::{LeafVersion, TapLeafHash, TapNodeHash};
use bitcoin::{Address, Script, ScriptBuf};

use crate::error::{OfflineError, OfflineResult};
use crate::types::NetworkKind;

/// Largest single script push
pub const MAX_PUSH_SIZE: usize = 520;

/// Lowest value a commitment output carries
pub const MIN_COMMITMENT_VALUE: u64 = 330;

fn push_bytes(data: &[u8]) -> OfflineResult<PushBytesBuf> {
    PushBytesBuf::try_from(data.to_vec())
        .map_err(|_| OfflineError::invalid_input(format!("{} bytes cannot be pushed", data.len())))
}

/// Resolve an address to its output script for `network`
///
/// Custom networks accept any address encoding.
pub fn address_script(address: &str, network: NetworkKind) -> OfflineResult<ScriptBuf> {
    let unchecked = Address::from_str(address.trim())?;
    let checked = match network {
        NetworkKind::Custom => unchecked.assume_checked(),
        other => unchecked.require_network(other.bitcoin_network()).map_err(|e| {
            OfflineError::invalid_input(format!("address {} not valid for {:?}: {}", address, other, e))
        })?,
    };
    Ok(checked.script_pubkey())
}

// =============================================================================
// Single-key inputs
// =============================================================================

/// Key-path-only P2TR output for `pubkey`
pub fn p2tr_key_path<C: Verification>(secp: &Secp256k1<C>, pubkey: &PublicKey) -> ScriptBuf {
    let (xonly, _) = pubkey.x_only_public_key();
    ScriptBuf::new_p2tr(secp, xonly, None)
}

pub fn p2wpkh(pubkey: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&CompressedPublicKey(*pubkey).wpubkey_hash())
}

// =============================================================================
// Commitment output
// =============================================================================

/// Tapscript leaf committing to the compiled target script
///
/// `<xonly P> OP_CHECKSIG <random> OP_DROP OP_FALSE OP_IF <chunks> OP_ENDIF`
pub fn commitment_leaf(
    internal_key: &XOnlyPublicKey,
    random_bytes: &[u8; 32],
    compiled_target_script: &[u8],
) -> OfflineResult<ScriptBuf> {
    let mut builder = Builder::new()
        .push_x_only_key(internal_key)
        .push_opcode(OP_CHECKSIG)
        .push_slice(push_bytes(random_bytes)?)
        .push_opcode(OP_DROP)
        .push_opcode(OP_FALSE)
        .push_opcode(OP_IF);
    for chunk in compiled_target_script.chunks(MAX_PUSH_SIZE) {
        builder = builder.push_slice(push_bytes(chunk)?);
    }
    Ok(builder.push_opcode(OP_ENDIF).into_script())
}

pub fn leaf_hash(leaf: &Script) -> TapLeafHash {
    TapLeafHash::from_script(leaf, LeafVersion::TapScript)
}

/// Commitment leaf, its hash and the P2TR output that commits to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub leaf_script: ScriptBuf,
    pub leaf_hash: [u8; 32],
    pub merkle_root: TapNodeHash,
    pub script_pubkey: ScriptBuf,
}

pub fn commitment<C: Verification>(
    secp: &Secp256k1<C>,
    pubkey: &PublicKey,
    random_bytes: &[u8; 32],
    compiled_target_script: &[u8],
) -> OfflineResult<Commitment> {
    let (internal_key, _) = pubkey.x_only_public_key();
    let leaf_script = commitment_leaf(&internal_key, random_bytes, compiled_target_script)?;
    let hash = leaf_hash(&leaf_script);
    let merkle_root = TapNodeHash::from(hash);
    let script_pubkey = ScriptBuf::new_p2tr(secp, internal_key, Some(merkle_root));
    Ok(Commitment {
        leaf_script,
        leaf_hash: hash.to_byte_array(),
        merkle_root,
        script_pubkey,
    })
}

// =============================================================================
// Multisig and custom scripts
// =============================================================================

/// `OP_m <pk_0> ... <pk_n-1> OP_n OP_CHECKMULTISIG` in the given key order
pub fn multisig_witness_script(pubkeys: &[PublicKey], minimum: u32) -> OfflineResult<ScriptBuf> {
    if pubkeys.is_empty() || minimum == 0 || minimum as usize > pubkeys.len() || pubkeys.len() > 20 {
        return Err(OfflineError::invalid_input(format!(
            "{}-of-{} is not a valid multisig policy",
            minimum,
            pubkeys.len()
        )));
    }
    let mut builder = Builder::new().push_int(minimum as i64);
    for pk in pubkeys {
        builder = builder.push_key(&bitcoin::PublicKey::new(*pk));
    }
    Ok(builder
        .push_int(pubkeys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script())
}

pub fn p2wsh(witness_script: &Script) -> ScriptBuf {
    ScriptBuf::new_p2wsh(&witness_script.wscript_hash())
}
