use bitcoin::consensus::encode::deserialize;
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::{Address, Network, Transaction};
use offline_signer::builder::scripts;
use offline_signer::multisig::{add_signature, finalize, get_signature_status, merge_signatures, MultisigPhase};
use offline_signer::qr::{QrDecoder, QrEncoder, QrOptions};
use offline_signer::state::{self, BaseParams, ExportRequest, MultisigSetup, StateUtxo};
use offline_signer::{
    import_sign_and_export, rebuild_with_new_fees, reconstruct, sign, EcSigner, ErrorCode, FeeOverrides, KeySigner,
    NetworkKind, SignerCapability, SignerOptions, TransactionType,
};

fn signer(byte: u8) -> KeySigner {
    KeySigner::from_secret_bytes(&[byte; 32]).expect("valid secret")
}

fn taproot_address(pk: &PublicKey) -> String {
    let secp = Secp256k1::verification_only();
    Address::p2tr(&secp, pk.x_only_public_key().0, None, Network::Regtest).to_string()
}

fn segwit_address(pk: &PublicKey) -> String {
    Address::p2wpkh(&CompressedPublicKey(*pk), Network::Regtest).to_string()
}

fn parse(hex_tx: &str) -> Transaction {
    deserialize(&hex::decode(hex_tx).expect("hex")).expect("consensus encoding")
}

/// Online side: one 100 000 sat Taproot UTXO, pay 50 000 at 10 sat/vB
fn export_funding(owner: &KeySigner) -> Vec<u8> {
    let pk = owner.public_key();
    let secp = Secp256k1::verification_only();
    let utxo = StateUtxo::from_display(
        &"ab".repeat(32),
        0,
        100_000,
        &hex::encode(scripts::p2tr_key_path(&secp, &pk).as_bytes()),
    )
    .expect("utxo");
    let base = BaseParams::new(taproot_address(&pk), segwit_address(&signer(0x77).public_key()), NetworkKind::Regtest)
        .with_fee_rate(10.0)
        .with_amount(50_000);
    let request = ExportRequest::new(TransactionType::Funding, base, vec![utxo]);
    state::encode(&state::export(&request, &pk).expect("export"))
}

#[test]
fn funding_signed_offline_matches_online_plan() {
    let owner = signer(1);
    let bytes = export_funding(&owner);

    let summary = state::inspect(&bytes).expect("inspect");
    assert_eq!(summary.transaction_type, TransactionType::Funding);
    assert_eq!(summary.total_input, 100_000);

    let decoded = state::decode(&bytes).expect("decode");
    let builder = reconstruct(&decoded, &SignerCapability::full(owner)).expect("reconstruct");
    let signed = sign(&builder).expect("sign");

    let tx = parse(&signed.hex);
    assert_eq!(tx.output.len(), 2);
    assert_eq!(tx.output[0].value.to_sat(), 50_000);
    assert_eq!(tx.output[1].value.to_sat(), 100_000 - 50_000 - signed.fee);
    assert_eq!(signed.fee, 10 * signed.vsize);
    assert_eq!(signed.txid, tx.compute_txid().to_string());
}

#[test]
fn fee_bump_at_signing_time() {
    let owner = signer(1);
    let bytes = export_funding(&owner);

    let original = import_sign_and_export(&bytes, &SignerOptions::new(SignerCapability::full(signer(1))))
        .expect("sign at 10 sat/vB");
    let bumped = import_sign_and_export(
        &bytes,
        &SignerOptions::new(SignerCapability::full(signer(1))).with_fee_rate(25.0),
    )
    .expect("sign at 25 sat/vB");

    assert_eq!(bumped.fee, 25 * bumped.vsize);
    assert!(bumped.fee > original.fee);
    let tx = parse(&bumped.hex);
    let before = parse(&original.hex);
    assert_eq!(tx.input[0].previous_output, before.input[0].previous_output);
    assert_eq!(tx.output[0], before.output[0]);
    assert_eq!(tx.output[1].value.to_sat() + bumped.fee, before.output[1].value.to_sat() + original.fee);
}

#[test]
fn rebuilt_state_round_trips_and_signs() {
    let owner = signer(1);
    let decoded = state::decode(&export_funding(&owner)).expect("decode");
    let rebuilt = rebuild_with_new_fees(&decoded, 25.0, &FeeOverrides::none()).expect("rebuild");
    assert_eq!(rebuilt.utxos, decoded.utxos);

    let again = state::decode(&state::encode(&rebuilt)).expect("decode rebuilt");
    let signed = sign(&reconstruct(&again, &SignerCapability::full(owner)).expect("reconstruct")).expect("sign");
    assert_eq!(signed.fee, 25 * signed.vsize);
}

#[test]
fn tampered_bytes_never_reach_the_signer() {
    let mut bytes = export_funding(&signer(1));
    let last = bytes.len() - 40;
    bytes[last] ^= 0x04;

    let err = import_sign_and_export(&bytes, &SignerOptions::new(SignerCapability::full(signer(1)))).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ChecksumMismatch);
    assert!(!state::validate(&bytes));
}

#[test]
fn state_crosses_air_gap_as_qr_frames() {
    let bytes = export_funding(&signer(1));
    let decoded = state::decode(&bytes).expect("decode");

    let encoder = QrEncoder::with_options(QrOptions { fragment_size: 64 });
    let mut frames = encoder.encode_state(&decoded).expect("frames");
    assert!(frames.len() > 1);
    frames.reverse();

    let received = QrDecoder::decode_state(&frames).expect("reassembled");
    assert_eq!(received, decoded);

    let signed = sign(&reconstruct(&received, &SignerCapability::full(signer(1))).expect("reconstruct")).expect("sign");
    let back = encoder.encode_finalized(&signed).expect("frames back");
    let mut decoder = QrDecoder::new();
    let mut payload = None;
    for frame in &back {
        if let offline_signer::qr::ScanResult::Complete(data) = decoder.receive(frame).expect("frame") {
            payload = Some(data);
        }
    }
    let returned: offline_signer::FinalizedTransaction =
        serde_json::from_slice(&payload.expect("complete")).expect("json");
    assert_eq!(returned, signed);
}

#[test]
fn two_of_three_multisig_across_machines() {
    let participants = [signer(0x11), signer(0x22), signer(0x33)];
    let pubkeys: Vec<PublicKey> = participants.iter().map(|s| s.public_key()).collect();
    let witness_script = scripts::multisig_witness_script(&pubkeys, 2).expect("policy");
    let lock = scripts::p2wsh(&witness_script).into_bytes();

    let utxo = StateUtxo {
        txid: [0x5c; 32],
        output_index: 1,
        value: 150_000,
        script_pubkey: lock,
    };
    let vault = segwit_address(&signer(0x44).public_key());
    let base = BaseParams::new(vault.clone(), "", NetworkKind::Regtest).with_fee_rate(3.0);
    let request = ExportRequest::new(TransactionType::MultiSig, base, vec![utxo]).with_multisig(MultisigSetup {
        pubkeys: pubkeys.clone(),
        minimum_signatures: 2,
        refund_vault: vault,
        requested_amount: 100_000,
        receiver: segwit_address(&signer(0x77).public_key()),
    });
    let exported = state::encode(&state::export(&request, &pubkeys[0]).expect("export"));

    // A signs, ships bytes to C
    let a_state = state::decode(&exported).expect("decode");
    let a = add_signature(&a_state, &SignerCapability::full(signer(0x11))).expect("A signs");
    assert!(!a.is_final);
    assert_eq!(get_signature_status(&a.state).expect("status").phase(), MultisigPhase::PartiallySigned(1));

    let c_state = state::decode(&state::encode(&a.state)).expect("decode at C");
    let c = add_signature(&c_state, &SignerCapability::full(signer(0x33))).expect("C signs");
    assert!(c.is_final);

    let finalized = finalize(&c.state).expect("finalize");
    let tx = parse(&finalized.hex);
    assert_eq!(tx.output[0].value.to_sat(), 100_000);
    assert_eq!(tx.input[0].witness.len(), 4);
    assert_eq!(tx.input[0].witness.nth(3), Some(witness_script.as_bytes()));

    // B signs a separate copy; with all three collected, A and B are used
    let b = add_signature(&state::decode(&exported).expect("decode"), &SignerCapability::full(signer(0x22)))
        .expect("B signs");
    let merged = merge_signatures(&c.state, &b.state).expect("merge");
    assert_eq!(get_signature_status(&merged).expect("status").collected, 3);
    let from_merged = finalize(&merged).expect("finalize merged");
    assert_eq!(from_merged.txid, finalized.txid);
    assert_ne!(from_merged.hex, finalized.hex);
}
