//! Output and fee planning
//!
//! Turns a state into an ordered output list, a fee and an optional change
//! output. Planning depends only on state fields and script shapes, so the
//! online exporter, the fee rebuilder and the offline reconstructor all
//! arrive at the same numbers.

use bitcoin::{Script, ScriptBuf};
use serde::Serialize;

use crate::error::{OfflineError, OfflineResult};
use crate::state::{ExtensionData, SerializedTransactionState, DUST_LIMIT};
use crate::types::TransactionType;

use super::scripts::{self, MIN_COMMITMENT_VALUE};
use super::sizing::{estimate_vsize, fee_for_vsize, InputKind};

/// Length of a P2TR output script
const P2TR_SCRIPT_LEN: usize = 34;

/// What an output is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRole {
    Recipient,
    Commitment,
    CustomScript,
    Change,
}

/// Output script, or a marker for the key-dependent commitment output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTemplate {
    Script(ScriptBuf),
    Commitment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub role: OutputRole,
    pub template: OutputTemplate,
    pub value: u64,
}

impl PlannedOutput {
    fn script_len(&self) -> usize {
        match &self.template {
            OutputTemplate::Script(script) => script.len(),
            OutputTemplate::Commitment => P2TR_SCRIPT_LEN,
        }
    }
}

/// Planned shape and fee of the transaction a state describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePlan {
    pub input_kinds: Vec<InputKind>,
    pub outputs: Vec<PlannedOutput>,
    /// Multisig witness script, for MultiSig states
    pub witness_script: Option<ScriptBuf>,
    pub total_input: u64,
    pub fee: u64,
    pub estimated_vsize: u64,
}

impl FeePlan {
    pub fn change(&self) -> Option<u64> {
        self.outputs
            .iter()
            .find(|o| o.role == OutputRole::Change)
            .map(|o| o.value)
    }

    pub fn output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// Value funded into a commitment output
pub fn commitment_value(priority_fee: u64, gas_sat_fee: u64) -> OfflineResult<u64> {
    let funded = priority_fee
        .checked_add(gas_sat_fee)
        .ok_or_else(|| OfflineError::invalid_input("priority and gas fees overflow"))?;
    Ok(funded.max(MIN_COMMITMENT_VALUE))
}

/// Plan outputs, fee and change for `state`
pub fn plan_fees(state: &SerializedTransactionState) -> OfflineResult<FeePlan> {
    let base = &state.base_params;
    let network = base.network;
    let ty = state.transaction_type;

    let (input_kinds, witness_script) = classify_inputs(state)?;

    let mut outputs = Vec::new();
    let recipient = |amount: u64, address: &str| -> OfflineResult<PlannedOutput> {
        check_not_dust(amount, "amount")?;
        Ok(PlannedOutput {
            role: OutputRole::Recipient,
            template: OutputTemplate::Script(scripts::address_script(address, network)?),
            value: amount,
        })
    };

    let change_address = match ty {
        TransactionType::Funding => {
            outputs.push(recipient(base.amount, &base.to)?);
            &base.from
        }
        TransactionType::Deployment | TransactionType::Interaction => {
            outputs.push(PlannedOutput {
                role: OutputRole::Commitment,
                template: OutputTemplate::Commitment,
                value: commitment_value(base.priority_fee, base.gas_sat_fee)?,
            });
            if ty == TransactionType::Interaction && base.amount > 0 {
                outputs.push(recipient(base.amount, &base.to)?);
            }
            &base.from
        }
        TransactionType::CustomScript => {
            let witness = match &state.extension {
                Some(ExtensionData::CustomScript { witness_script }) => witness_script,
                _ => return Err(OfflineError::corrupt("CustomScript state without witness script")),
            };
            check_not_dust(base.amount, "amount")?;
            outputs.push(PlannedOutput {
                role: OutputRole::CustomScript,
                template: OutputTemplate::Script(scripts::p2wsh(Script::from_bytes(witness))),
                value: base.amount,
            });
            &base.from
        }
        TransactionType::Cancel => &base.from,
        TransactionType::MultiSig => {
            let ms = state.multisig()?;
            outputs.push(recipient(ms.requested_amount, &ms.receiver)?);
            &ms.refund_vault
        }
    };
    let change_script = scripts::address_script(change_address, network)?;

    let total_input = state.total_input_value()?;
    let fixed = outputs.iter().try_fold(0u64, |acc, o| {
        acc.checked_add(o.value)
            .ok_or_else(|| OfflineError::invalid_input("output values overflow"))
    })?;

    let mut lens: Vec<usize> = outputs.iter().map(PlannedOutput::script_len).collect();
    lens.push(change_script.len());
    let vsize_with_change = estimate_vsize(&input_kinds, &lens);
    let fee_with_change = fee_for_vsize(base.fee_rate, vsize_with_change);

    let change = total_input
        .checked_sub(fixed)
        .and_then(|rest| rest.checked_sub(fee_with_change))
        .filter(|change| *change >= DUST_LIMIT);

    let estimated_vsize = match change {
        Some(value) => {
            outputs.push(PlannedOutput {
                role: OutputRole::Change,
                template: OutputTemplate::Script(change_script),
                value,
            });
            vsize_with_change
        }
        None if ty == TransactionType::Cancel => {
            // a cancel without its return output would have no outputs at all
            return Err(OfflineError::InsufficientFundsForFee {
                required: fee_with_change.saturating_add(DUST_LIMIT),
                available: total_input,
            });
        }
        None => {
            lens.pop();
            let vsize = estimate_vsize(&input_kinds, &lens);
            let fee = fee_for_vsize(base.fee_rate, vsize);
            let required = fixed.saturating_add(fee);
            if total_input < required {
                return Err(OfflineError::InsufficientFundsForFee {
                    required,
                    available: total_input,
                });
            }
            vsize
        }
    };

    let fee = total_input - outputs.iter().map(|o| o.value).sum::<u64>();
    Ok(FeePlan {
        input_kinds,
        outputs,
        witness_script,
        total_input,
        fee,
        estimated_vsize,
    })
}

fn classify_inputs(state: &SerializedTransactionState) -> OfflineResult<(Vec<InputKind>, Option<ScriptBuf>)> {
    if let Some(ms) = &state.multisig {
        let witness_script = scripts::multisig_witness_script(&ms.pubkeys, ms.minimum_signatures)?;
        let expected = scripts::p2wsh(&witness_script);
        let kind = InputKind::MultisigWitness {
            script_len: witness_script.len(),
            required: ms.minimum_signatures as usize,
        };
        for (i, utxo) in state.utxos.iter().enumerate() {
            if utxo.script_pubkey != expected.as_bytes() {
                return Err(OfflineError::script_mismatch(format!(
                    "input {} is not locked to the {}-of-{} witness script",
                    i,
                    ms.minimum_signatures,
                    ms.pubkeys.len()
                )));
            }
        }
        return Ok((vec![kind; state.utxos.len()], Some(witness_script)));
    }

    let kinds = state
        .utxos
        .iter()
        .enumerate()
        .map(|(i, utxo)| {
            let script = Script::from_bytes(&utxo.script_pubkey);
            if script.is_p2tr() {
                Ok(InputKind::TaprootKeyPath)
            } else if script.is_p2wpkh() {
                Ok(InputKind::SegwitV0KeyHash)
            } else {
                Err(OfflineError::script_mismatch(format!(
                    "input {} has an unsupported script type",
                    i
                )))
            }
        })
        .collect::<OfflineResult<Vec<_>>>()?;
    Ok((kinds, None))
}

fn check_not_dust(amount: u64, what: &str) -> OfflineResult<()> {
    if amount < DUST_LIMIT {
        return Err(OfflineError::invalid_input(format!(
            "{} {} is below the dust limit of {}",
            what, amount, DUST_LIMIT
        )));
    }
    Ok(())
}
