//! Offline Signer Settings
//!
//! Limits and policy knobs shared by the codec, the reconstructor and the
//! fee rebuilder:
//! - Security level presets (standard, strict)
//! - Decode limits that bound memory use on untrusted input
//! - Fee-rate sanity bounds and rebuild policy
//! - JSON loading with validation

use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, OfflineResult};

/// Settings preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsLevel {
    /// Suitable for most air-gapped setups
    Standard,
    /// Tighter limits for hardware or high-value signing stations
    Strict,
    /// User-defined settings
    Custom,
}

/// Codec and policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineSettings {
    /// Preset these settings were derived from
    pub level: SettingsLevel,

    // Decode limits
    /// Maximum number of UTXOs accepted in a state
    pub max_utxos: usize,
    /// Maximum length of any script, string or precomputed blob
    pub max_script_bytes: usize,
    /// Maximum multisig participants (P2WSH CHECKMULTISIG limit)
    pub max_pubkeys: usize,

    // Fee policy
    /// Lowest accepted fee rate (sat/vB)
    pub min_fee_rate: f64,
    /// Highest accepted fee rate (sat/vB)
    pub max_fee_rate: f64,
    /// Whether a fee rebuild may lower the fee rate
    pub allow_fee_decrease: bool,
}

impl Default for OfflineSettings {
    fn default() -> Self {
        Self::standard()
    }
}

impl OfflineSettings {
    /// Standard preset
    pub fn standard() -> Self {
        Self {
            level: SettingsLevel::Standard,

            max_utxos: 1_000,
            max_script_bytes: 100_000,
            max_pubkeys: 20,

            min_fee_rate: 0.1,
            max_fee_rate: 10_000.0,
            allow_fee_decrease: true,
        }
    }

    /// Strict preset
    pub fn strict() -> Self {
        Self {
            level: SettingsLevel::Strict,

            max_utxos: 250,
            max_script_bytes: 10_000,
            max_pubkeys: 20,

            min_fee_rate: 1.0,
            max_fee_rate: 2_000.0,
            allow_fee_decrease: false,
        }
    }

    /// Load settings from JSON; missing fields fall back to the standard preset
    pub fn from_json(json: &str) -> OfflineResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| OfflineError::invalid_input(format!("settings: {}", e)))?;
        settings.check()?;
        Ok(settings)
    }

    /// Reject settings that cannot work at all
    pub fn check(&self) -> OfflineResult<()> {
        if self.max_utxos == 0 {
            return Err(OfflineError::invalid_input("max_utxos must be positive"));
        }
        if self.max_pubkeys == 0 || self.max_pubkeys > 20 {
            return Err(OfflineError::invalid_input("max_pubkeys must be within 1..=20"));
        }
        if !(self.min_fee_rate.is_finite() && self.max_fee_rate.is_finite())
            || self.min_fee_rate <= 0.0
            || self.min_fee_rate > self.max_fee_rate
        {
            return Err(OfflineError::invalid_input("fee rate bounds are inconsistent"));
        }
        Ok(())
    }

    /// Soft warnings about risky but workable combinations
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.max_fee_rate > 50_000.0 {
            warnings.push("Warning: maximum fee rate allows absurd fees".to_string());
        }

        if self.allow_fee_decrease && self.level == SettingsLevel::Strict {
            warnings.push("Warning: strict preset with fee decreases enabled".to_string());
        }

        warnings
    }

    /// Validate a fee rate against the configured bounds
    pub fn check_fee_rate(&self, fee_rate: f64) -> OfflineResult<()> {
        if !fee_rate.is_finite() || fee_rate < self.min_fee_rate || fee_rate > self.max_fee_rate {
            return Err(OfflineError::invalid_input(format!(
                "fee rate {} outside [{}, {}] sat/vB",
                fee_rate, self.min_fee_rate, self.max_fee_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let standard = OfflineSettings::standard();
        let strict = OfflineSettings::strict();
        assert!(strict.max_utxos < standard.max_utxos);
        assert!(!strict.allow_fee_decrease);
        assert!(standard.check().is_ok());
        assert!(strict.check().is_ok());
        assert!(standard.validate().is_empty());
    }

    #[test]
    fn test_from_json_partial() {
        let settings = OfflineSettings::from_json(r#"{"level":"custom","max_utxos":5}"#).unwrap();
        assert_eq!(settings.max_utxos, 5);
        assert_eq!(settings.max_pubkeys, 20);
        assert_eq!(settings.level, SettingsLevel::Custom);
    }

    #[test]
    fn test_from_json_rejects_bad_bounds() {
        let err = OfflineSettings::from_json(r#"{"min_fee_rate":10.0,"max_fee_rate":1.0}"#).unwrap_err();
        assert!(matches!(err, OfflineError::InvalidInput(_)));
    }

    #[test]
    fn test_check_fee_rate() {
        let settings = OfflineSettings::standard();
        assert!(settings.check_fee_rate(25.0).is_ok());
        assert!(settings.check_fee_rate(0.0).is_err());
        assert!(settings.check_fee_rate(f64::NAN).is_err());
        assert!(settings.check_fee_rate(1e9).is_err());
    }
}
