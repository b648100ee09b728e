//! Deterministic test fixtures shared by the unit test modules

use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::{Address, Network};

use crate::builder::scripts;
use crate::signer::{EcSigner, KeySigner, SignerCapability};
use crate::state::{export, BaseParams, ExportRequest, MultisigSetup, SerializedTransactionState, StateUtxo};
use crate::types::{NetworkKind, TransactionType};

pub const NETWORK: NetworkKind = NetworkKind::Regtest;

pub fn key(byte: u8) -> KeySigner {
    KeySigner::from_secret_bytes(&[byte; 32]).unwrap()
}

pub fn full(byte: u8) -> SignerCapability {
    SignerCapability::full(key(byte))
}

pub fn pubkey(byte: u8) -> PublicKey {
    key(byte).public_key()
}

pub fn segwit_address(pk: &PublicKey) -> String {
    Address::p2wpkh(&CompressedPublicKey(*pk), Network::Regtest).to_string()
}

pub fn taproot_address(pk: &PublicKey) -> String {
    let secp = Secp256k1::verification_only();
    let (xonly, _) = pk.x_only_public_key();
    Address::p2tr(&secp, xonly, None, Network::Regtest).to_string()
}

/// Address of an unrelated recipient
pub fn recipient() -> String {
    segwit_address(&pubkey(0x77))
}

pub fn taproot_utxo(pk: &PublicKey, value: u64, n: u8) -> StateUtxo {
    let secp = Secp256k1::verification_only();
    StateUtxo {
        txid: [n; 32],
        output_index: n as u32,
        value,
        script_pubkey: scripts::p2tr_key_path(&secp, pk).into_bytes(),
    }
}

pub fn segwit_utxo(pk: &PublicKey, value: u64, n: u8) -> StateUtxo {
    StateUtxo {
        txid: [n; 32],
        output_index: 0,
        value,
        script_pubkey: scripts::p2wpkh(pk).into_bytes(),
    }
}

/// Funding request spending one Taproot UTXO owned by key 1
pub fn funding_request(fee_rate: f64, utxo_value: u64, amount: u64) -> ExportRequest {
    let pk = pubkey(1);
    let base = BaseParams::new(taproot_address(&pk), recipient(), NETWORK)
        .with_fee_rate(fee_rate)
        .with_amount(amount);
    ExportRequest::new(TransactionType::Funding, base, vec![taproot_utxo(&pk, utxo_value, 1)]).with_chain_id(7)
}

pub fn funding_state() -> SerializedTransactionState {
    export(&funding_request(10.0, 100_000, 50_000), &pubkey(1)).unwrap()
}

/// Deployment request with a fixed commitment salt
pub fn deployment_request() -> ExportRequest {
    let pk = pubkey(1);
    let base = BaseParams::new(taproot_address(&pk), "", NETWORK)
        .with_fee_rate(5.0)
        .with_fees(1_000, 2_000);
    ExportRequest::new(
        TransactionType::Deployment,
        base,
        vec![taproot_utxo(&pk, 60_000, 1), segwit_utxo(&pk, 40_000, 2)],
    )
    .with_compiled_script(vec![0x5a; 700])
    .with_random_bytes([9u8; 32])
}

pub fn deployment_state() -> SerializedTransactionState {
    export(&deployment_request(), &pubkey(1)).unwrap()
}

/// Key bytes of the A, B, C multisig participants
pub const MULTISIG_KEYS: [u8; 3] = [0x11, 0x22, 0x33];

/// 2-of-3 state spending two P2WSH UTXOs
pub fn multisig_state() -> SerializedTransactionState {
    let pubkeys: Vec<PublicKey> = MULTISIG_KEYS.iter().map(|b| pubkey(*b)).collect();
    let witness_script = scripts::multisig_witness_script(&pubkeys, 2).unwrap();
    let lock = scripts::p2wsh(&witness_script).into_bytes();
    let utxos = vec![
        StateUtxo {
            txid: [0xa1; 32],
            output_index: 0,
            value: 80_000,
            script_pubkey: lock.clone(),
        },
        StateUtxo {
            txid: [0xa2; 32],
            output_index: 3,
            value: 40_000,
            script_pubkey: lock,
        },
    ];
    let vault = segwit_address(&pubkey(0x44));
    let base = BaseParams::new(vault.clone(), "", NETWORK).with_fee_rate(4.0);
    let request = ExportRequest::new(TransactionType::MultiSig, base, utxos).with_multisig(MultisigSetup {
        pubkeys: pubkeys.clone(),
        minimum_signatures: 2,
        refund_vault: vault,
        requested_amount: 70_000,
        receiver: recipient(),
    });
    export(&request, &pubkeys[0]).unwrap()
}
