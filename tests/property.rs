use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::{Address, Network};
use offline_signer::builder::scripts;
use offline_signer::multisig::add_signature;
use offline_signer::state::{self, BaseParams, ExportRequest, MultisigSetup, SerializedTransactionState, StateUtxo};
use offline_signer::{
    rebuild_with_new_fees, reconstruct, EcSigner, ErrorCode, FeeOverrides, KeySigner, NetworkKind, SignerCapability,
    TransactionType,
};
use proptest::prelude::*;

fn owner() -> KeySigner {
    KeySigner::from_secret_bytes(&[1u8; 32]).expect("valid secret")
}

fn taproot_address(pk: &PublicKey) -> String {
    let secp = Secp256k1::verification_only();
    Address::p2tr(&secp, pk.x_only_public_key().0, None, Network::Regtest).to_string()
}

fn segwit_address(pk: &PublicKey) -> String {
    Address::p2wpkh(&CompressedPublicKey(*pk), Network::Regtest).to_string()
}

fn signer(byte: u8) -> KeySigner {
    KeySigner::from_secret_bytes(&[byte; 32]).expect("valid secret")
}

const COSIGNERS: [u8; 3] = [0x11, 0x22, 0x33];

fn any_utxos(pk: PublicKey) -> impl Strategy<Value = Vec<StateUtxo>> {
    let secp = Secp256k1::verification_only();
    utxos_locked_to(scripts::p2tr_key_path(&secp, &pk).into_bytes())
}

fn utxos_locked_to(script: Vec<u8>) -> impl Strategy<Value = Vec<StateUtxo>> {
    prop::collection::btree_map((any::<[u8; 32]>(), 0u32..8), 50_000u64..5_000_000, 1..6).prop_map(move |entries| {
        entries
            .into_iter()
            .map(|((txid, output_index), value)| StateUtxo {
                txid,
                output_index,
                value,
                script_pubkey: script.clone(),
            })
            .collect()
    })
}

fn any_deployment() -> impl Strategy<Value = SerializedTransactionState> {
    let pk = owner().public_key();
    (
        any_utxos(pk),
        prop::collection::vec(any::<u8>(), 1..1_500),
        any::<[u8; 32]>(),
        1u32..500,
        0u64..10_000,
        0u64..10_000,
    )
        .prop_map(move |(utxos, compiled, salt, rate, priority, gas)| {
            let base = BaseParams::new(taproot_address(&pk), "", NetworkKind::Regtest)
                .with_fee_rate(rate as f64 / 10.0)
                .with_fees(priority, gas);
            let request = ExportRequest::new(TransactionType::Deployment, base, utxos)
                .with_compiled_script(compiled)
                .with_random_bytes(salt);
            state::export(&request, &pk).expect("export")
        })
}

fn any_custom_script() -> impl Strategy<Value = SerializedTransactionState> {
    let pk = owner().public_key();
    (any_utxos(pk), prop::collection::vec(any::<u8>(), 1..600), 1u32..500, 1_000u64..20_000).prop_map(
        move |(utxos, witness_script, rate, amount)| {
            let base = BaseParams::new(taproot_address(&pk), "", NetworkKind::Regtest)
                .with_fee_rate(rate as f64 / 10.0)
                .with_amount(amount);
            let request =
                ExportRequest::new(TransactionType::CustomScript, base, utxos).with_witness_script(witness_script);
            state::export(&request, &pk).expect("export")
        },
    )
}

fn any_cancel() -> impl Strategy<Value = SerializedTransactionState> {
    let pk = owner().public_key();
    (any_utxos(pk), any::<[u8; 32]>(), 1u32..500).prop_map(move |(utxos, replaced, rate)| {
        let base = BaseParams::new(taproot_address(&pk), "", NetworkKind::Regtest).with_fee_rate(rate as f64 / 10.0);
        let request = ExportRequest::new(TransactionType::Cancel, base, utxos).with_replaced_txid(replaced);
        state::export(&request, &pk).expect("export")
    })
}

/// 2-of-3 states carrying any subset of contributions
fn any_multisig() -> impl Strategy<Value = SerializedTransactionState> {
    let pubkeys: Vec<PublicKey> = COSIGNERS.iter().map(|b| signer(*b).public_key()).collect();
    let witness_script = scripts::multisig_witness_script(&pubkeys, 2).expect("policy");
    let lock = scripts::p2wsh(&witness_script).into_bytes();
    (
        utxos_locked_to(lock),
        1u32..200,
        1_000u64..10_000,
        prop::sample::subsequence(COSIGNERS.to_vec(), 0..=3),
    )
        .prop_map(move |(utxos, rate, requested, contributors)| {
            let vault = segwit_address(&signer(0x44).public_key());
            let base = BaseParams::new(vault.clone(), "", NetworkKind::Regtest).with_fee_rate(rate as f64 / 10.0);
            let request = ExportRequest::new(TransactionType::MultiSig, base, utxos).with_multisig(MultisigSetup {
                pubkeys: pubkeys.clone(),
                minimum_signatures: 2,
                refund_vault: vault,
                requested_amount: requested,
                receiver: segwit_address(&signer(0x77).public_key()),
            });
            let mut state = state::export(&request, &pubkeys[0]).expect("export");
            for byte in contributors {
                state = add_signature(&state, &SignerCapability::full(signer(byte)))
                    .expect("contribution")
                    .state;
            }
            state
        })
}

fn any_state() -> impl Strategy<Value = SerializedTransactionState> {
    prop_oneof![any_deployment(), any_custom_script(), any_cancel(), any_multisig()]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn states_roundtrip_through_bytes(state in any_state()) {
        let bytes = state::encode(&state);
        let decoded = state::decode(&bytes).expect("decode");
        prop_assert_eq!(&decoded, &state);
        prop_assert_eq!(state::encode(&decoded), bytes);
    }

    #[test]
    fn any_single_bit_flip_is_detected(state in any_state(), position in any::<prop::sample::Index>(), bit in 0u8..8) {
        let mut bytes = state::encode(&state);
        let i = position.index(bytes.len());
        bytes[i] ^= 1 << bit;
        let err = state::decode(&bytes).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::ChecksumMismatch);
    }

    #[test]
    fn rebuild_preserves_commitment(state in any_deployment(), bump in 1u32..200) {
        let new_rate = state.base_params.fee_rate + bump as f64 / 10.0;
        let rebuilt = match rebuild_with_new_fees(&state, new_rate, &FeeOverrides::none()) {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                prop_assert_eq!(e.code(), ErrorCode::InsufficientFundsForFee);
                return Ok(());
            }
        };
        prop_assert_eq!(&rebuilt.utxos, &state.utxos);
        prop_assert_eq!(&rebuilt.precomputed, &state.precomputed);

        let watch = SignerCapability::watch_only(owner().public_key());
        let before = reconstruct(&state, &watch).expect("reconstruct");
        let after = reconstruct(&rebuilt, &watch).expect("reconstruct rebuilt");
        prop_assert_eq!(
            before.commitment().map(|c| c.script_pubkey.clone()),
            after.commitment().map(|c| c.script_pubkey.clone())
        );
        prop_assert!(after.fee() >= before.fee());
    }

    #[test]
    fn reconstruction_is_deterministic(state in any_deployment()) {
        let bytes = state::encode(&state);
        let a = reconstruct(&state::decode(&bytes).expect("decode"), &SignerCapability::full(owner())).expect("a");
        let b = reconstruct(&state::decode(&bytes).expect("decode"), &SignerCapability::watch_only(owner().public_key()))
            .expect("b");
        prop_assert_eq!(a.unsigned_hex(), b.unsigned_hex());
        prop_assert_eq!(a.plan().fee, a.plan().total_input - a.plan().output_value());
    }
}
