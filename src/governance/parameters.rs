//! Protocol parameters that can be changed at runtime.
//!
//! Every parameter maps onto one field of [`ProtocolConfig`] and carries
//! hard bounds. An update is checked against the bounds first and then
//! against the whole configuration, so cross-field constraints such as
//! `base_slippage <= max_slippage` still hold afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, MAX_FEE_BPS, MAX_REPORTERS, SLIPPAGE_CAP_LIMIT_BPS};

const DAY_SECS: u64 = 86_400;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameters adjustable by an admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolParameter {
    // ─────────────────────────────────────────────────────────────────────────
    // FEES
    // ─────────────────────────────────────────────────────────────────────────
    /// Mint fee (basis points)
    MintFee,
    /// Burn fee (basis points)
    BurnFee,
    /// Swap fee (basis points)
    SwapFee,

    // ─────────────────────────────────────────────────────────────────────────
    // RESERVE
    // ─────────────────────────────────────────────────────────────────────────
    /// Minimum collateral ratio after protected withdrawals (basis points)
    MinCollateralRatio,
    /// Minimum collateral ratio after reserve trades (basis points)
    TradeMinCollateralRatio,

    // ─────────────────────────────────────────────────────────────────────────
    // TRADING
    // ─────────────────────────────────────────────────────────────────────────
    /// Slippage floor of every swap (basis points)
    BaseSlippage,
    /// Slippage cap (basis points)
    MaxSlippage,
    /// Default minimum-output tolerance (basis points)
    DefaultSlippageFloor,

    // ─────────────────────────────────────────────────────────────────────────
    // NAV AND POLICY
    // ─────────────────────────────────────────────────────────────────────────
    /// Share of each mint routed to the NAV pool (basis points)
    NavContribution,
    /// Deviation that triggers a rebalance (basis points)
    NavDeviationThreshold,
    /// Minimum seconds between rebalances
    RebalanceInterval,
    /// Policy base rate (basis points)
    PolicyBaseRate,
    /// Lowest burn contribution (basis points)
    PolicyMinContribution,
    /// Highest burn contribution (basis points)
    PolicyMaxContribution,
    /// Highest burn premium (basis points)
    PolicyMaxPremium,

    // ─────────────────────────────────────────────────────────────────────────
    // ORACLE AND SWEEP
    // ─────────────────────────────────────────────────────────────────────────
    /// Maximum oracle record age (seconds)
    PriceFreshness,
    /// Stable peg tolerance (basis points)
    PegTolerance,
    /// Quorum after bootstrap
    FullQuorum,
    /// PARITY price at a 1:1 market-cap ratio (8 decimals)
    ParityPriceMultiplier,
    /// Minimum seconds between surplus sweeps
    SweepInterval,
}

impl ProtocolParameter {
    /// Every parameter
    pub const ALL: [ProtocolParameter; 20] = [
        Self::MintFee,
        Self::BurnFee,
        Self::SwapFee,
        Self::MinCollateralRatio,
        Self::TradeMinCollateralRatio,
        Self::BaseSlippage,
        Self::MaxSlippage,
        Self::DefaultSlippageFloor,
        Self::NavContribution,
        Self::NavDeviationThreshold,
        Self::RebalanceInterval,
        Self::PolicyBaseRate,
        Self::PolicyMinContribution,
        Self::PolicyMaxContribution,
        Self::PolicyMaxPremium,
        Self::PriceFreshness,
        Self::PegTolerance,
        Self::FullQuorum,
        Self::ParityPriceMultiplier,
        Self::SweepInterval,
    ];

    /// Machine name, as used on the command line and in events
    pub fn key(&self) -> &'static str {
        match self {
            Self::MintFee => "mint_fee",
            Self::BurnFee => "burn_fee",
            Self::SwapFee => "swap_fee",
            Self::MinCollateralRatio => "min_collateral_ratio",
            Self::TradeMinCollateralRatio => "trade_min_collateral_ratio",
            Self::BaseSlippage => "base_slippage",
            Self::MaxSlippage => "max_slippage",
            Self::DefaultSlippageFloor => "default_slippage_floor",
            Self::NavContribution => "nav_contribution",
            Self::NavDeviationThreshold => "nav_deviation_threshold",
            Self::RebalanceInterval => "rebalance_interval",
            Self::PolicyBaseRate => "policy_base_rate",
            Self::PolicyMinContribution => "policy_min_contribution",
            Self::PolicyMaxContribution => "policy_max_contribution",
            Self::PolicyMaxPremium => "policy_max_premium",
            Self::PriceFreshness => "price_freshness",
            Self::PegTolerance => "peg_tolerance",
            Self::FullQuorum => "full_quorum",
            Self::ParityPriceMultiplier => "parity_price_multiplier",
            Self::SweepInterval => "sweep_interval",
        }
    }

    /// Get description
    pub fn description(&self) -> &'static str {
        match self {
            Self::MintFee => "PARITY fee taken from every mint and sent to the surplus sink",
            Self::BurnFee => "PARITY fee taken from every burn and sent to the surplus sink",
            Self::SwapFee => "Fee retained by the reserve on every PMM swap",
            Self::MinCollateralRatio => "Collateral ratio protected withdrawals must preserve",
            Self::TradeMinCollateralRatio => "Collateral ratio reserve trades must preserve",
            Self::BaseSlippage => "Slippage applied to every swap",
            Self::MaxSlippage => "Cap on the dynamic slippage curve",
            Self::DefaultSlippageFloor => "Tolerance used when a caller passes a zero minimum output",
            Self::NavContribution => "Share of each mint deposit routed to the NAV pool",
            Self::NavDeviationThreshold => "Target weight deviation that triggers a rebalance",
            Self::RebalanceInterval => "Cool-down between NAV rebalances",
            Self::PolicyBaseRate => "Base rate of the dynamic burn policy",
            Self::PolicyMinContribution => "Lowest contribution the burn policy charges",
            Self::PolicyMaxContribution => "Highest contribution the burn policy charges",
            Self::PolicyMaxPremium => "Highest premium the burn policy pays",
            Self::PriceFreshness => "Age after which consensus prices are stale",
            Self::PegTolerance => "Allowed stable price deviation from one dollar",
            Self::FullQuorum => "Live reporters required once bootstrap ends",
            Self::ParityPriceMultiplier => "USD price of PARITY at a 1:1 KSM/DOT market-cap ratio",
            Self::SweepInterval => "Cool-down between surplus sweeps",
        }
    }

    /// Get validation bounds (min, max)
    pub fn bounds(&self) -> (u64, u64) {
        match self {
            Self::MintFee | Self::BurnFee | Self::SwapFee => (0, MAX_FEE_BPS),
            Self::MinCollateralRatio => (BPS_DIVISOR, 5 * BPS_DIVISOR),
            Self::TradeMinCollateralRatio => (BPS_DIVISOR, 5 * BPS_DIVISOR),
            Self::BaseSlippage | Self::MaxSlippage | Self::DefaultSlippageFloor => {
                (0, SLIPPAGE_CAP_LIMIT_BPS)
            }
            Self::NavContribution => (0, BPS_DIVISOR / 2),
            Self::NavDeviationThreshold => (1, BPS_DIVISOR),
            Self::RebalanceInterval => (0, 30 * DAY_SECS),
            Self::PolicyBaseRate
            | Self::PolicyMinContribution
            | Self::PolicyMaxContribution
            | Self::PolicyMaxPremium => (0, BPS_DIVISOR),
            Self::PriceFreshness => (1, DAY_SECS),
            Self::PegTolerance => (0, 2_000),
            Self::FullQuorum => (1, MAX_REPORTERS as u64),
            Self::ParityPriceMultiplier => (1, u64::MAX),
            Self::SweepInterval => (0, 30 * DAY_SECS),
        }
    }

    /// Validate a value for this parameter
    pub fn validate(&self, value: u64) -> Result<()> {
        let (min, max) = self.bounds();
        if value < min || value > max {
            return Err(Error::ParameterOutOfBounds {
                name: self.key().into(),
                value: value as u128,
                min: min as u128,
                max: max as u128,
            });
        }
        Ok(())
    }

    /// Parameters that move solvency or pricing directly
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::MinCollateralRatio
                | Self::TradeMinCollateralRatio
                | Self::PriceFreshness
                | Self::ParityPriceMultiplier
        )
    }

    /// Current value in `config`
    pub fn get(&self, config: &ProtocolConfig) -> u64 {
        match self {
            Self::MintFee => config.fees.mint_fee_bps,
            Self::BurnFee => config.fees.burn_fee_bps,
            Self::SwapFee => config.trading.swap_fee_bps,
            Self::MinCollateralRatio => config.reserve.min_collateral_ratio_bps,
            Self::TradeMinCollateralRatio => config.reserve.trade_min_collateral_ratio_bps,
            Self::BaseSlippage => config.trading.base_slippage_bps,
            Self::MaxSlippage => config.trading.max_slippage_bps,
            Self::DefaultSlippageFloor => config.trading.default_slippage_floor_bps,
            Self::NavContribution => config.nav.contribution_bps,
            Self::NavDeviationThreshold => config.nav.deviation_threshold_bps,
            Self::RebalanceInterval => config.nav.rebalance_interval_secs,
            Self::PolicyBaseRate => config.policy.base_rate_bps,
            Self::PolicyMinContribution => config.policy.min_contribution_bps,
            Self::PolicyMaxContribution => config.policy.max_contribution_bps,
            Self::PolicyMaxPremium => config.policy.max_premium_bps,
            Self::PriceFreshness => config.oracle.freshness_secs,
            Self::PegTolerance => config.oracle.peg_tolerance_bps,
            Self::FullQuorum => config.oracle.full_quorum as u64,
            Self::ParityPriceMultiplier => config.oracle.parity_price_multiplier,
            Self::SweepInterval => config.sweep.interval_secs,
        }
    }

    fn field<'a>(&self, config: &'a mut ProtocolConfig) -> Option<&'a mut u64> {
        Some(match self {
            Self::MintFee => &mut config.fees.mint_fee_bps,
            Self::BurnFee => &mut config.fees.burn_fee_bps,
            Self::SwapFee => &mut config.trading.swap_fee_bps,
            Self::MinCollateralRatio => &mut config.reserve.min_collateral_ratio_bps,
            Self::TradeMinCollateralRatio => &mut config.reserve.trade_min_collateral_ratio_bps,
            Self::BaseSlippage => &mut config.trading.base_slippage_bps,
            Self::MaxSlippage => &mut config.trading.max_slippage_bps,
            Self::DefaultSlippageFloor => &mut config.trading.default_slippage_floor_bps,
            Self::NavContribution => &mut config.nav.contribution_bps,
            Self::NavDeviationThreshold => &mut config.nav.deviation_threshold_bps,
            Self::RebalanceInterval => &mut config.nav.rebalance_interval_secs,
            Self::PolicyBaseRate => &mut config.policy.base_rate_bps,
            Self::PolicyMinContribution => &mut config.policy.min_contribution_bps,
            Self::PolicyMaxContribution => &mut config.policy.max_contribution_bps,
            Self::PolicyMaxPremium => &mut config.policy.max_premium_bps,
            Self::PriceFreshness => &mut config.oracle.freshness_secs,
            Self::PegTolerance => &mut config.oracle.peg_tolerance_bps,
            Self::ParityPriceMultiplier => &mut config.oracle.parity_price_multiplier,
            Self::SweepInterval => &mut config.sweep.interval_secs,
            Self::FullQuorum => return None,
        })
    }

    /// Return `config` with this parameter set to `value`.
    ///
    /// Fails when the value is out of bounds or the resulting
    /// configuration is inconsistent; `config` itself is never touched.
    pub fn apply(&self, config: &ProtocolConfig, value: u64) -> Result<ProtocolConfig> {
        self.validate(value)?;
        let mut updated = config.clone();
        match self.field(&mut updated) {
            Some(field) => *field = value,
            None => updated.oracle.full_quorum = value as usize,
        }
        updated.validate()?;
        Ok(updated)
    }
}

impl fmt::Display for ProtocolParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for ProtocolParameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.key() == s)
            .ok_or_else(|| Error::InvalidParameter {
                name: "parameter".into(),
                reason: format!("unknown parameter {:?}", s),
            })
    }
}
