//! Replace-by-fee rebuild
//!
//! Rewrites only the fee-dependent fields of a state. UTXOs, commitment
//! salt, compiled script and timestamp are carried over untouched, so the
//! rebuilt state still reconstructs to the same commitment output and the
//! same rebuild always yields the same bytes.

use serde::{Deserialize, Serialize};

use crate::builder::plan::plan_fees;
use crate::error::{OfflineError, OfflineResult};
use crate::state::SerializedTransactionState;
use crate::utils::config::OfflineSettings;
use crate::{log_info, log_warn};

/// Optional replacements for the commitment funding fees
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverrides {
    pub priority_fee: Option<u64>,
    pub gas_sat_fee: Option<u64>,
}

impl FeeOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn priority_fee(mut self, value: u64) -> Self {
        self.priority_fee = Some(value);
        self
    }

    pub fn gas_sat_fee(mut self, value: u64) -> Self {
        self.gas_sat_fee = Some(value);
        self
    }
}

/// Rebuild with the standard settings
pub fn rebuild_with_new_fees(
    state: &SerializedTransactionState,
    new_fee_rate: f64,
    overrides: &FeeOverrides,
) -> OfflineResult<SerializedTransactionState> {
    rebuild_with_new_fees_with_settings(state, new_fee_rate, overrides, &OfflineSettings::default())
}

/// New state paying `new_fee_rate` sat/vB
pub fn rebuild_with_new_fees_with_settings(
    state: &SerializedTransactionState,
    new_fee_rate: f64,
    overrides: &FeeOverrides,
    settings: &OfflineSettings,
) -> OfflineResult<SerializedTransactionState> {
    state.verify_checksum()?;
    state.validate(settings)?;
    settings.check_fee_rate(new_fee_rate)?;

    let old_fee_rate = state.base_params.fee_rate;
    if !settings.allow_fee_decrease && new_fee_rate < old_fee_rate {
        return Err(OfflineError::invalid_input(format!(
            "fee rate decrease from {} to {} sat/vB is not allowed",
            old_fee_rate, new_fee_rate
        )));
    }

    let old_fee = plan_fees(state)?.fee;

    let mut rebuilt = state.clone();
    rebuilt.base_params.fee_rate = new_fee_rate;
    if let Some(priority_fee) = overrides.priority_fee {
        rebuilt.base_params.priority_fee = priority_fee;
    }
    if let Some(gas_sat_fee) = overrides.gas_sat_fee {
        rebuilt.base_params.gas_sat_fee = gas_sat_fee;
    }

    if let Some(ms) = rebuilt.multisig.as_mut() {
        if !ms.collected_signatures.is_empty() {
            log_warn!(
                "fees",
                "Discarding multisig signatures made over the old outputs",
                discarded = ms.collected_signatures.len()
            );
            ms.collected_signatures.clear();
        }
    }

    let plan = plan_fees(&rebuilt)?;
    let rebuilt = rebuilt.seal();

    log_info!(
        "fees",
        "Fees rebuilt",
        old_fee_rate = old_fee_rate,
        new_fee_rate = new_fee_rate,
        old_fee = old_fee,
        new_fee = plan.fee,
        checksum = hex::encode(rebuilt.checksum)
    );
    Ok(rebuilt)
}
