use bitcoin::consensus::encode::deserialize;
use bitcoin::Transaction;

use super::*;
use crate::builder::reconstruct;
use crate::error::{ErrorCode, OfflineResult};
use crate::fixtures::*;
use crate::signer::testing::MockQuantumSigner;
use crate::signer::QuantumSigner;
use crate::state::{encode, export};

fn parse(signed: &FinalizedTransaction) -> Transaction {
    deserialize(&hex::decode(&signed.hex).unwrap()).unwrap()
}

/// Co-signer whose own verification always fails
struct RejectingQuantumSigner(MockQuantumSigner);

impl QuantumSigner for RejectingQuantumSigner {
    fn public_key(&self) -> Vec<u8> {
        self.0.public_key()
    }

    fn sign(&self, digest: &[u8; 32]) -> OfflineResult<Vec<u8>> {
        self.0.sign(digest)
    }

    fn verify(&self, _digest: &[u8; 32], _signature: &[u8]) -> bool {
        false
    }
}

#[test]
fn test_sign_funding_is_deterministic() {
    let builder = reconstruct(&funding_state(), &full(1)).unwrap();
    let a = sign(&builder).unwrap();
    let b = sign(&builder).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.txid, builder.unsigned_txid().to_string());
    assert!(a.quantum_signature.is_none());

    let tx = parse(&a);
    assert_eq!(tx.input[0].witness.len(), 1);
    assert_eq!(tx.input[0].witness.nth(0).map(|w| w.len()), Some(64));
}

#[test]
fn test_watch_only_cannot_sign() {
    let builder = reconstruct(&funding_state(), &SignerCapability::watch_only(pubkey(1))).unwrap();
    assert_eq!(sign(&builder).unwrap_err(), OfflineError::MissingPrivateKey);
}

#[test]
fn test_mixed_inputs_get_matching_witnesses() {
    let builder = reconstruct(&deployment_state(), &full(1)).unwrap();
    let hashes = signature_hashes(&builder).unwrap();
    assert_eq!(hashes[0].algorithm, SighashAlgorithm::Schnorr);
    assert_eq!(hashes[1].algorithm, SighashAlgorithm::Ecdsa);

    let tx = parse(&sign(&builder).unwrap());
    assert_eq!(tx.input[0].witness.len(), 1);
    assert_eq!(tx.input[1].witness.len(), 2);
    assert_eq!(tx.input[1].witness.nth(1), Some(&pubkey(1).serialize()[..]));
    // DER signature plus SIGHASH_ALL
    assert_eq!(tx.input[1].witness.nth(0).and_then(|s| s.last().copied()), Some(0x01));
    assert_eq!(tx.output, builder.unsigned_transaction().output);
}

#[test]
fn test_hybrid_adds_quantum_cosignature() {
    let quantum = MockQuantumSigner::new(5);
    let state = export(&deployment_request().with_quantum_key(quantum.key.clone()), &pubkey(1)).unwrap();
    let builder = reconstruct(&state, &SignerCapability::hybrid(key(1), MockQuantumSigner::new(5))).unwrap();

    let signed = sign(&builder).unwrap();
    let digest = builder.quantum_digest().unwrap();
    let expected = quantum.sign(&digest).unwrap();
    assert_eq!(signed.quantum_signature, Some(hex::encode(expected)));
}

#[test]
fn test_failed_quantum_verification_reports_past_last_input() {
    let quantum = MockQuantumSigner::new(5);
    let state = export(&deployment_request().with_quantum_key(quantum.key.clone()), &pubkey(1)).unwrap();
    let capability = SignerCapability::hybrid(key(1), RejectingQuantumSigner(quantum));
    let builder = reconstruct(&state, &capability).unwrap();

    assert_eq!(
        sign(&builder).unwrap_err(),
        OfflineError::SignatureVerificationFailed { input: 2 }
    );
}

#[test]
fn test_import_sign_and_export_with_new_fee_rate() {
    let bytes = encode(&funding_state());

    let plain = import_sign_and_export(&bytes, &SignerOptions::new(full(1))).unwrap();
    assert_eq!(plain.fee, 1_420);

    let bumped = import_sign_and_export(&bytes, &SignerOptions::new(full(1)).with_fee_rate(25.0)).unwrap();
    assert_eq!(bumped.fee, 3_550);
    assert_eq!(bumped.vsize, plain.vsize);
    assert_ne!(bumped.txid, plain.txid);

    let tx = parse(&bumped);
    assert_eq!(tx.output[0].value.to_sat(), 50_000);
    assert_eq!(tx.output[1].value.to_sat(), 100_000 - 50_000 - 3_550);
}

#[test]
fn test_import_applies_settings() {
    let bytes = encode(&funding_state());
    let options = SignerOptions::new(full(1))
        .with_fee_rate(5.0)
        .with_settings(OfflineSettings::strict());
    assert_eq!(
        import_sign_and_export(&bytes, &options).unwrap_err().code(),
        ErrorCode::InvalidInput
    );

    let mut tampered = bytes.clone();
    tampered[30] ^= 0x40;
    assert_eq!(
        import_sign_and_export(&tampered, &SignerOptions::new(full(1))).unwrap_err().code(),
        ErrorCode::ChecksumMismatch
    );
}

#[test]
fn test_import_overrides_commitment_fees() {
    let bytes = encode(&deployment_state());
    let options = SignerOptions::new(full(1)).with_priority_fee(4_000).with_gas_sat_fee(500);
    let signed = import_sign_and_export(&bytes, &options).unwrap();
    assert_eq!(parse(&signed).output[0].value.to_sat(), 4_500);
}

#[test]
fn test_sign_multisig_contributes_and_finalizes() {
    let first = multisig::add_signature(&multisig_state(), &full(MULTISIG_KEYS[1])).unwrap();
    let builder = reconstruct(&first.state, &full(MULTISIG_KEYS[0])).unwrap();
    let signed = sign(&builder).unwrap();

    let tx = parse(&signed);
    // empty dummy, two signatures, witness script
    assert_eq!(tx.input[0].witness.len(), 4);
    assert_eq!(tx.input[1].witness.len(), 4);
    assert!(tx.input[0].witness.nth(0).unwrap().is_empty());
}

#[test]
fn test_sign_multisig_below_threshold_needs_a_contributor() {
    let state = multisig_state();
    let watch = SignerCapability::watch_only(pubkey(MULTISIG_KEYS[0]));
    let err = sign(&reconstruct(&state, &watch).unwrap()).unwrap_err();
    assert_eq!(err, OfflineError::MissingPrivateKey);

    let outsider = reconstruct(&state, &full(0x55)).unwrap();
    assert_eq!(sign(&outsider).unwrap_err().code(), ErrorCode::UnknownSigner);

    // a participant that already signed still waits for the threshold
    let once = multisig::add_signature(&state, &full(MULTISIG_KEYS[0])).unwrap().state;
    let again = reconstruct(&once, &full(MULTISIG_KEYS[0])).unwrap();
    assert_eq!(sign(&again).unwrap_err().code(), ErrorCode::InsufficientSignatures);
}

#[test]
fn test_watch_only_finalizes_once_threshold_met() {
    let a = multisig::add_signature(&multisig_state(), &full(MULTISIG_KEYS[0])).unwrap();
    let ac = multisig::add_signature(&a.state, &full(MULTISIG_KEYS[2])).unwrap();
    let watch = SignerCapability::watch_only(pubkey(MULTISIG_KEYS[1]));

    let signed = sign(&reconstruct(&ac.state, &watch).unwrap()).unwrap();
    assert_eq!(signed, multisig::finalize(&ac.state).unwrap());
}
