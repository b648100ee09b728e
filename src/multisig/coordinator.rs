//! Multisig coordinator
//!
//! Signers contribute out of band, each on its own copy of the state.
//! Contributions are keyed by signer index, and the final witness orders
//! signatures by ascending index, so the finalized transaction does not
//! depend on the order signers arrived in.

use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{ecdsa, Witness};

use crate::builder::{Reconstructor, TransactionBuilder};
use crate::error::{OfflineError, OfflineResult};
use crate::signer::{verify_ecdsa, SignerCapability};
use crate::signing::{signature_hashes, FinalizedTransaction};
use crate::state::{PartialSignature, SerializedTransactionState, StateCodec};
use crate::utils::config::OfflineSettings;
use crate::{log_info, log_warn};

/// Result of one signer's contribution
#[derive(Debug, Clone, PartialEq)]
pub struct AddSignatureOutcome {
    /// New state carrying the contribution
    pub state: SerializedTransactionState,
    /// Whether a signature was added
    pub signed: bool,
    /// Whether the threshold is now met
    pub is_final: bool,
}

pub fn add_signature(
    state: &SerializedTransactionState,
    capability: &SignerCapability,
) -> OfflineResult<AddSignatureOutcome> {
    add_signature_with_settings(state, capability, &OfflineSettings::default())
}

/// Sign every input with `capability` and record the contribution
pub fn add_signature_with_settings(
    state: &SerializedTransactionState,
    capability: &SignerCapability,
    settings: &OfflineSettings,
) -> OfflineResult<AddSignatureOutcome> {
    state.verify_checksum()?;
    state.validate(settings)?;
    let ms = state.multisig()?;
    let pubkey = capability.public_key();
    let index = ms
        .signer_index(&pubkey)
        .ok_or_else(|| OfflineError::UnknownSigner(format!("{} is not a multisig participant", pubkey)))?;
    if ms.collected_signatures.contains_key(&index) {
        return Err(OfflineError::DuplicateSignature(index));
    }
    let signer = capability.ec_signer()?;

    let builder = Reconstructor::reconstruct_with_settings(state, capability, settings)?;
    let mut input_signatures = Vec::with_capacity(state.utxos.len());
    for sighash in signature_hashes(&builder)? {
        let signature = signer.sign_ecdsa(&sighash.digest)?;
        if !verify_ecdsa(&pubkey, &sighash.digest, &signature) {
            return Err(OfflineError::SignatureVerificationFailed { input: sighash.index });
        }
        input_signatures.push(ecdsa::Signature::sighash_all(signature).to_vec());
    }

    let mut next = state.clone();
    let collected = match next.multisig.as_mut() {
        Some(data) => {
            data.collected_signatures
                .insert(index, PartialSignature { input_signatures });
            data.collected()
        }
        None => return Err(OfflineError::invalid_input("state is not a multisig state")),
    };
    let next = next.seal();
    let is_final = collected >= ms.minimum_signatures;

    log_info!(
        "multisig",
        "Signature collected",
        signer_index = index,
        collected = collected,
        required = ms.minimum_signatures
    );

    Ok(AddSignatureOutcome {
        state: next,
        signed: true,
        is_final,
    })
}

/// Assemble the signed transaction from the collected signatures
pub fn finalize(state: &SerializedTransactionState) -> OfflineResult<FinalizedTransaction> {
    finalize_with_settings(state, &OfflineSettings::default())
}

pub fn finalize_with_settings(
    state: &SerializedTransactionState,
    settings: &OfflineSettings,
) -> OfflineResult<FinalizedTransaction> {
    state.verify_checksum()?;
    state.validate(settings)?;
    let ms = state.multisig()?;
    let required = ms.minimum_signatures;
    if ms.collected() < required {
        return Err(OfflineError::InsufficientSignatures {
            collected: ms.collected(),
            required,
        });
    }

    // any participant key reconstructs a multisig spend
    let participant = ms
        .pubkeys
        .first()
        .ok_or_else(|| OfflineError::corrupt("multisig state without participants"))?;
    let capability = SignerCapability::watch_only(*participant);
    let builder = Reconstructor::reconstruct_with_settings(state, &capability, settings)?;
    let tx = assemble(&builder, state)?;

    let finalized = FinalizedTransaction::from_transaction(&tx, builder.fee(), None);
    log_info!(
        "multisig",
        "Multisig finalized",
        txid = finalized.txid,
        signers = required,
        vsize = finalized.vsize
    );
    Ok(finalized)
}

fn assemble(builder: &TransactionBuilder, state: &SerializedTransactionState) -> OfflineResult<bitcoin::Transaction> {
    let ms = state.multisig()?;
    let witness_script = builder
        .witness_script()
        .ok_or_else(|| OfflineError::corrupt("multisig builder without witness script"))?;
    let signers: Vec<_> = ms
        .collected_signatures
        .iter()
        .take(ms.minimum_signatures as usize)
        .collect();

    let mut tx = builder.unsigned_transaction().clone();
    for sighash in signature_hashes(builder)? {
        let input = sighash.index;
        let mut witness = Witness::new();
        witness.push(&[] as &[u8]);
        for (signer_index, partial) in &signers {
            let raw = partial
                .input_signatures
                .get(input)
                .ok_or(OfflineError::SignatureVerificationFailed { input })?;
            let signature = ecdsa::Signature::from_slice(raw)
                .map_err(|_| OfflineError::SignatureVerificationFailed { input })?;
            if signature.sighash_type != EcdsaSighashType::All {
                return Err(OfflineError::SignatureVerificationFailed { input });
            }
            let pubkey = ms
                .pubkeys
                .get(**signer_index as usize)
                .ok_or_else(|| OfflineError::corrupt(format!("signer index {} out of range", signer_index)))?;
            if !verify_ecdsa(pubkey, &sighash.digest, &signature.signature) {
                log_warn!(
                    "multisig",
                    "Collected signature does not verify",
                    signer_index = signer_index,
                    input = input
                );
                return Err(OfflineError::SignatureVerificationFailed { input });
            }
            witness.push(raw);
        }
        witness.push(witness_script.as_bytes());
        tx.input[input].witness = witness;
    }
    Ok(tx)
}

/// Union the contributions of two copies of the same base state
///
/// Both copies must describe the same transaction; entries for the same
/// signer must be byte-identical.
pub fn merge_signatures(
    a: &SerializedTransactionState,
    b: &SerializedTransactionState,
) -> OfflineResult<SerializedTransactionState> {
    a.verify_checksum()?;
    b.verify_checksum()?;
    let theirs = b.multisig()?;
    a.multisig()?;

    if StateCodec::encode_body(&without_signatures(a)) != StateCodec::encode_body(&without_signatures(b)) {
        return Err(OfflineError::corrupt("states describe different transactions"));
    }

    let mut merged = a.clone();
    if let Some(ours) = merged.multisig.as_mut() {
        for (index, partial) in &theirs.collected_signatures {
            match ours.collected_signatures.get(index) {
                Some(existing) if existing != partial => {
                    return Err(OfflineError::corrupt(format!(
                        "conflicting signatures for signer {}",
                        index
                    )));
                }
                Some(_) => {}
                None => {
                    ours.collected_signatures.insert(*index, partial.clone());
                }
            }
        }
    }
    Ok(merged.seal())
}

fn without_signatures(state: &SerializedTransactionState) -> SerializedTransactionState {
    let mut stripped = state.clone();
    if let Some(ms) = stripped.multisig.as_mut() {
        ms.collected_signatures.clear();
    }
    stripped
}
