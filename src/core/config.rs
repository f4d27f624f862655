//! Protocol configuration and parameters.
//!
//! This module defines every tunable parameter of the PARITY engine,
//! grouped by the component that consumes it. Defaults come from
//! [`crate::utils::constants`]. Configuration can be loaded from a JSON
//! file and overridden through `PARITY_*` environment variables; runtime
//! changes go through [`crate::governance::ProtocolParameter`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::nav::NavPayoutMode;
use crate::utils::constants::*;
use crate::utils::crypto::Address;
use crate::utils::validation::validate_bps;

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Oracle consensus parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Maximum record age in seconds, inclusive
    pub freshness_secs: u64,
    /// Allowed stable price deviation from $1.00
    pub peg_tolerance_bps: u64,
    /// Reporter registry capacity
    pub max_reporters: usize,
    /// Quorum once bootstrap mode ends
    pub full_quorum: usize,
    /// PARITY price at a 1:1 KSM/DOT market-cap ratio (8 decimals)
    pub parity_price_multiplier: u64,
    /// Consensus records kept for TWAP
    pub history_size: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            freshness_secs: PRICE_FRESHNESS_SECS,
            peg_tolerance_bps: STABLE_PEG_TOLERANCE_BPS,
            max_reporters: MAX_REPORTERS,
            full_quorum: FULL_QUORUM,
            parity_price_multiplier: DEFAULT_PARITY_PRICE_MULTIPLIER,
            history_size: PRICE_HISTORY_SIZE,
        }
    }
}

/// Reserve ledger parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReserveConfig {
    /// Minimum collateral ratio after protected withdrawals
    pub min_collateral_ratio_bps: u64,
    /// Minimum collateral ratio after a reserve trade
    pub trade_min_collateral_ratio_bps: u64,
    /// Rounding tolerance when comparing trade legs (USD, 18 decimals)
    pub trade_usd_epsilon: u128,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            min_collateral_ratio_bps: MIN_COLLATERAL_RATIO_BPS,
            trade_min_collateral_ratio_bps: TRADE_MIN_COLLATERAL_RATIO_BPS,
            trade_usd_epsilon: TRADE_USD_EPSILON,
        }
    }
}

/// PMM trading parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Slippage applied to every swap
    pub base_slippage_bps: u64,
    /// Slippage cap, at most 1000
    pub max_slippage_bps: u64,
    /// Flat swap fee
    pub swap_fee_bps: u64,
    /// Floor substituted for a zero minimum output
    pub default_slippage_floor_bps: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            base_slippage_bps: BASE_SLIPPAGE_BPS,
            max_slippage_bps: MAX_SLIPPAGE_BPS,
            swap_fee_bps: SWAP_FEE_BPS,
            default_slippage_floor_bps: DEFAULT_SLIPPAGE_FLOOR_BPS,
        }
    }
}

/// NAV accumulator parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Share of every mint routed to the pool
    pub contribution_bps: u64,
    /// Target KSM share
    pub target_ksm_bps: u64,
    /// Target DOT share
    pub target_dot_bps: u64,
    /// Target stable share
    pub target_stable_bps: u64,
    /// Deviation that triggers a rebalance
    pub deviation_threshold_bps: u64,
    /// Minimum seconds between rebalances
    pub rebalance_interval_secs: u64,
    /// How burns are paid from the pool
    pub payout_mode: NavPayoutMode,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            contribution_bps: NAV_CONTRIBUTION_BPS,
            target_ksm_bps: NAV_TARGET_KSM_BPS,
            target_dot_bps: NAV_TARGET_DOT_BPS,
            target_stable_bps: NAV_TARGET_STABLE_BPS,
            deviation_threshold_bps: NAV_DEVIATION_THRESHOLD_BPS,
            rebalance_interval_secs: NAV_REBALANCE_INTERVAL_SECS,
            payout_mode: NavPayoutMode::default(),
        }
    }
}

/// Dynamic burn policy parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnPolicyConfig {
    /// Base contribution / premium rate
    pub base_rate_bps: u64,
    /// Lowest contribution
    pub min_contribution_bps: u64,
    /// Highest contribution
    pub max_contribution_bps: u64,
    /// Highest premium
    pub max_premium_bps: u64,
}

impl Default for BurnPolicyConfig {
    fn default() -> Self {
        Self {
            base_rate_bps: POLICY_BASE_RATE_BPS,
            min_contribution_bps: POLICY_MIN_CONTRIBUTION_BPS,
            max_contribution_bps: POLICY_MAX_CONTRIBUTION_BPS,
            max_premium_bps: POLICY_MAX_PREMIUM_BPS,
        }
    }
}

/// Mint and burn fees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Mint fee, paid in PARITY to the surplus sink
    pub mint_fee_bps: u64,
    /// Burn fee, charged in PARITY
    pub burn_fee_bps: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            mint_fee_bps: MINT_FEE_BPS,
            burn_fee_bps: BURN_FEE_BPS,
        }
    }
}

/// Surplus sweeper parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Account receiving fees and swept surplus
    pub sink: Address,
    /// Minimum seconds between sweeps
    pub interval_secs: u64,
    /// Smallest surplus worth sweeping (USD, 18 decimals)
    pub min_surplus_usd: u128,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sink: Address::from_label("parity/surplus-sink"),
            interval_secs: SWEEP_INTERVAL_SECS,
            min_surplus_usd: MIN_SWEEP_USD,
        }
    }
}

/// Maintenance trigger parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Run rebalance and sweep after every committed mint or burn
    pub auto_run: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { auto_run: true }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Oracle consensus
    pub oracle: OracleConfig,
    /// Reserve ledger
    pub reserve: ReserveConfig,
    /// PMM trading
    pub trading: TradingConfig,
    /// NAV accumulator
    pub nav: NavConfig,
    /// Dynamic burn policy
    pub policy: BurnPolicyConfig,
    /// Mint and burn fees
    pub fees: FeeConfig,
    /// Surplus sweeper
    pub sweep: SweepConfig,
    /// Maintenance trigger
    pub maintenance: MaintenanceConfig,
}

impl ProtocolConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Defaults overlaid with `PARITY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay `PARITY_*` environment variables
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, value)))
        }

        if let Some(v) = lookup("PARITY_MINT_FEE_BPS") {
            self.fees.mint_fee_bps = parse("PARITY_MINT_FEE_BPS", v)?;
        }
        if let Some(v) = lookup("PARITY_BURN_FEE_BPS") {
            self.fees.burn_fee_bps = parse("PARITY_BURN_FEE_BPS", v)?;
        }
        if let Some(v) = lookup("PARITY_MIN_COLLATERAL_RATIO_BPS") {
            self.reserve.min_collateral_ratio_bps = parse("PARITY_MIN_COLLATERAL_RATIO_BPS", v)?;
        }
        if let Some(v) = lookup("PARITY_FRESHNESS_SECS") {
            self.oracle.freshness_secs = parse("PARITY_FRESHNESS_SECS", v)?;
        }
        if let Some(v) = lookup("PARITY_PRICE_MULTIPLIER") {
            self.oracle.parity_price_multiplier = parse("PARITY_PRICE_MULTIPLIER", v)?;
        }
        if let Some(v) = lookup("PARITY_MAX_SLIPPAGE_BPS") {
            self.trading.max_slippage_bps = parse("PARITY_MAX_SLIPPAGE_BPS", v)?;
        }
        if let Some(v) = lookup("PARITY_NAV_CONTRIBUTION_BPS") {
            self.nav.contribution_bps = parse("PARITY_NAV_CONTRIBUTION_BPS", v)?;
        }
        if let Some(v) = lookup("PARITY_SURPLUS_SINK") {
            self.sweep.sink = Address::from_hex(v.trim())?;
        }
        if let Some(v) = lookup("PARITY_AUTO_MAINTENANCE") {
            self.maintenance.auto_run = parse("PARITY_AUTO_MAINTENANCE", v)?;
        }
        Ok(self)
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, reason: &str| Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        };

        // Oracle
        if self.oracle.freshness_secs == 0 {
            return Err(invalid("oracle.freshness_secs", "must be greater than 0"));
        }
        validate_bps("oracle.peg_tolerance_bps", self.oracle.peg_tolerance_bps, BPS_DIVISOR)?;
        if self.oracle.max_reporters == 0 || self.oracle.max_reporters > MAX_REPORTERS {
            return Err(invalid("oracle.max_reporters", "must be between 1 and 5"));
        }
        if self.oracle.full_quorum == 0 || self.oracle.full_quorum > self.oracle.max_reporters {
            return Err(invalid("oracle.full_quorum", "must be between 1 and max_reporters"));
        }
        if self.oracle.parity_price_multiplier == 0 {
            return Err(invalid("oracle.parity_price_multiplier", "must be greater than 0"));
        }

        // Reserve
        if self.reserve.min_collateral_ratio_bps < BPS_DIVISOR {
            return Err(invalid("reserve.min_collateral_ratio_bps", "must be at least 10000"));
        }
        if self.reserve.trade_min_collateral_ratio_bps < BPS_DIVISOR {
            return Err(invalid("reserve.trade_min_collateral_ratio_bps", "must be at least 10000"));
        }

        // Trading
        validate_bps("trading.max_slippage_bps", self.trading.max_slippage_bps, SLIPPAGE_CAP_LIMIT_BPS)?;
        if self.trading.base_slippage_bps > self.trading.max_slippage_bps {
            return Err(invalid("trading.base_slippage_bps", "exceeds max_slippage_bps"));
        }
        validate_bps("trading.swap_fee_bps", self.trading.swap_fee_bps, MAX_FEE_BPS)?;
        validate_bps(
            "trading.default_slippage_floor_bps",
            self.trading.default_slippage_floor_bps,
            SLIPPAGE_CAP_LIMIT_BPS,
        )?;

        // NAV
        validate_bps("nav.contribution_bps", self.nav.contribution_bps, BPS_DIVISOR / 2)?;
        if self.nav.target_ksm_bps + self.nav.target_dot_bps + self.nav.target_stable_bps != BPS_DIVISOR {
            return Err(invalid("nav.targets", "must sum to 10000 bps"));
        }
        validate_bps("nav.deviation_threshold_bps", self.nav.deviation_threshold_bps, BPS_DIVISOR)?;

        // Policy
        validate_bps("policy.base_rate_bps", self.policy.base_rate_bps, BPS_DIVISOR)?;
        validate_bps("policy.max_contribution_bps", self.policy.max_contribution_bps, BPS_DIVISOR)?;
        validate_bps("policy.max_premium_bps", self.policy.max_premium_bps, BPS_DIVISOR)?;
        if self.policy.min_contribution_bps > self.policy.max_contribution_bps {
            return Err(invalid("policy.min_contribution_bps", "exceeds max_contribution_bps"));
        }

        // Fees and sweep
        validate_bps("fees.mint_fee_bps", self.fees.mint_fee_bps, MAX_FEE_BPS)?;
        validate_bps("fees.burn_fee_bps", self.fees.burn_fee_bps, MAX_FEE_BPS)?;
        if self.sweep.sink.is_zero() {
            return Err(Error::ZeroAddress);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.oracle.freshness_secs, 300);
        assert_eq!(config.nav.contribution_bps, 1_000);
        assert_eq!(config.fees.mint_fee_bps, 30);
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let mut config = ProtocolConfig::default();
        config.trading.max_slippage_bps = 1_001;
        assert!(config.validate().is_err());

        let mut config = ProtocolConfig::default();
        config.nav.target_stable_bps = 9_000;
        assert!(config.validate().is_err());

        let mut config = ProtocolConfig::default();
        config.policy.min_contribution_bps = 3_000;
        assert!(config.validate().is_err());

        let mut config = ProtocolConfig::default();
        config.sweep.sink = Address::ZERO;
        assert_eq!(config.validate(), Err(Error::ZeroAddress));
    }

    #[test]
    fn test_overrides() {
        let sink = Address::from_label("treasury");
        let vars: HashMap<&str, String> = [
            ("PARITY_MINT_FEE_BPS", "0".to_string()),
            ("PARITY_AUTO_MAINTENANCE", "false".to_string()),
            ("PARITY_SURPLUS_SINK", sink.to_hex()),
        ]
        .into_iter()
        .collect();

        let config = ProtocolConfig::default()
            .with_overrides(|key| vars.get(key).cloned())
            .unwrap();
        assert_eq!(config.fees.mint_fee_bps, 0);
        assert!(!config.maintenance.auto_run);
        assert_eq!(config.sweep.sink, sink);
        assert_eq!(config.fees.burn_fee_bps, BURN_FEE_BPS);
    }

    #[test]
    fn test_override_parse_error() {
        let result = ProtocolConfig::default().with_overrides(|key| {
            (key == "PARITY_BURN_FEE_BPS").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("parity.json");

        let mut config = ProtocolConfig::default();
        config.fees.burn_fee_bps = 45;
        config.save(&path).unwrap();

        let loaded = ProtocolConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ProtocolConfig = serde_json::from_str(r#"{"fees": {"mint_fee_bps": 10}}"#).unwrap();
        assert_eq!(config.fees.mint_fee_bps, 10);
        assert_eq!(config.fees.burn_fee_bps, BURN_FEE_BPS);
        assert_eq!(config.oracle, OracleConfig::default());
    }
}
