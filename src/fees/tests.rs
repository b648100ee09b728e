use super::*;
use crate::builder::{plan_fees, reconstruct};
use crate::error::{ErrorCode, OfflineError};
use crate::fixtures::*;
use crate::multisig;
use crate::signer::SignerCapability;
use crate::state::{decode, encode, export};
use crate::utils::config::OfflineSettings;

#[test]
fn test_rebuild_updates_fee_rate_and_checksum() {
    let state = funding_state();
    let rebuilt = rebuild_with_new_fees(&state, 25.0, &FeeOverrides::none()).unwrap();

    assert_eq!(rebuilt.base_params.fee_rate, 25.0);
    assert_ne!(rebuilt.checksum, state.checksum);
    assert!(rebuilt.verify_checksum().is_ok());
    assert_eq!(decode(&encode(&rebuilt)).unwrap(), rebuilt);

    let plan = plan_fees(&rebuilt).unwrap();
    assert_eq!(plan.fee, 3_550);
    assert_eq!(plan.change(), Some(46_450));
}

#[test]
fn test_rebuild_is_repeatable() {
    let state = deployment_state();
    let overrides = FeeOverrides::none().gas_sat_fee(2_500);
    let a = rebuild_with_new_fees(&state, 12.0, &overrides).unwrap();
    let b = rebuild_with_new_fees(&state, 12.0, &overrides).unwrap();

    assert_eq!(a, b);
    assert_eq!(encode(&a), encode(&b));
    assert_eq!(a.timestamp, state.timestamp);
    assert_eq!(a.chain_id, state.chain_id);
    assert_eq!(a.base_params.from, state.base_params.from);
}

#[test]
fn test_rebuild_keeps_inputs_and_commitment() {
    let state = deployment_state();
    let rebuilt = rebuild_with_new_fees(&state, 40.0, &FeeOverrides::none().priority_fee(5_000)).unwrap();

    assert_eq!(rebuilt.utxos, state.utxos);
    assert_eq!(rebuilt.precomputed, state.precomputed);
    assert_eq!(rebuilt.chain_id, state.chain_id);
    assert_eq!(rebuilt.base_params.priority_fee, 5_000);
    assert_eq!(rebuilt.base_params.gas_sat_fee, 2_000);

    let before = reconstruct(&state, &full(1)).unwrap();
    let after = reconstruct(&rebuilt, &full(1)).unwrap();
    assert_eq!(
        before.commitment().map(|c| c.script_pubkey.clone()),
        after.commitment().map(|c| c.script_pubkey.clone())
    );
    assert_eq!(after.unsigned_transaction().output[0].value.to_sat(), 7_000);
    assert!(after.fee() > before.fee());
}

#[test]
fn test_rebuild_rejects_out_of_range_rates() {
    let state = funding_state();
    for rate in [0.0, -1.0, f64::NAN, 1_000_000.0] {
        let err = rebuild_with_new_fees(&state, rate, &FeeOverrides::none()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput, "rate {}", rate);
    }
}

#[test]
fn test_fee_decrease_follows_settings() {
    let state = funding_state();
    assert!(rebuild_with_new_fees(&state, 2.0, &FeeOverrides::none()).is_ok());

    let err =
        rebuild_with_new_fees_with_settings(&state, 2.0, &FeeOverrides::none(), &OfflineSettings::strict()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[test]
fn test_rebuild_insufficient_funds() {
    let state = export(&funding_request(1.0, 50_700, 50_000), &pubkey(1)).unwrap();
    match rebuild_with_new_fees(&state, 100.0, &FeeOverrides::none()) {
        Err(OfflineError::InsufficientFundsForFee { available, required }) => {
            assert_eq!(available, 50_700);
            assert!(required > available);
        }
        other => panic!("expected InsufficientFundsForFee, got {:?}", other),
    }
}

#[test]
fn test_rebuild_refuses_tampered_state() {
    let mut state = funding_state();
    state.utxos[0].value = 1_000_000;
    let err = rebuild_with_new_fees(&state, 20.0, &FeeOverrides::none()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ChecksumMismatch);
}

#[test]
fn test_rebuild_discards_multisig_signatures() {
    let signed = multisig::add_signature(&multisig_state(), &full(MULTISIG_KEYS[0])).unwrap().state;
    assert_eq!(multisig::get_signature_status(&signed).unwrap().collected, 1);

    let rebuilt = rebuild_with_new_fees(&signed, 8.0, &FeeOverrides::none()).unwrap();
    assert_eq!(multisig::get_signature_status(&rebuilt).unwrap().collected, 0);

    // signers contribute again over the new outputs
    let a = multisig::add_signature(&rebuilt, &full(MULTISIG_KEYS[0])).unwrap();
    let b = multisig::add_signature(&a.state, &full(MULTISIG_KEYS[2])).unwrap();
    assert!(b.is_final);
    let finalized = multisig::finalize(&b.state).unwrap();

    let watch = SignerCapability::watch_only(pubkey(MULTISIG_KEYS[0]));
    assert_eq!(finalized.fee, reconstruct(&rebuilt, &watch).unwrap().fee());
}

#[test]
fn test_overrides_builder() {
    let overrides = FeeOverrides::none().priority_fee(1).gas_sat_fee(2);
    assert_eq!(overrides.priority_fee, Some(1));
    assert_eq!(overrides.gas_sat_fee, Some(2));
    assert_eq!(FeeOverrides::default(), FeeOverrides::none());
}
