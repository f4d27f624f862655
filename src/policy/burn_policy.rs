//! Dynamic burn policy.
//!
//! A pure function of the total supply and the burner's baseline:
//!
//! ```text
//! g = supply / baseline                       (18 decimals)
//! g >= 2:  premium      = min(base * (g - 2), max_premium)            -> negative bps
//! g <  2:  contribution = clamp(base * (2 - g), min_contrib, max_contrib) -> positive bps
//! ```
//!
//! A baseline whose weight is smaller than the burn is replaced by the
//! current supply (g = 1). A zero supply or zero baseline yields the flat
//! base rate.

use serde::{Deserialize, Serialize};

use crate::core::config::BurnPolicyConfig;
use crate::error::Result;
use crate::policy::baseline::UserBaseline;
use crate::utils::constants::POLICY_GROWTH_PIVOT;
use crate::utils::math::{mul_div, FixedPoint};

/// Inputs of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInput {
    /// Current total supply
    pub total_supply: u128,
    /// Burner's baseline
    pub baseline: UserBaseline,
    /// PARITY being burned
    pub burn_amount: u128,
}

/// Signed policy adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyAdjustment {
    /// Share of the redemption routed to the NAV pool
    Contribution(u64),
    /// Extra share paid from the NAV pool
    Premium(u64),
}

impl PolicyAdjustment {
    /// Positive for contributions, negative for premiums
    pub fn signed_bps(&self) -> i64 {
        match *self {
            PolicyAdjustment::Contribution(bps) => bps as i64,
            PolicyAdjustment::Premium(bps) => -(bps as i64),
        }
    }
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Adjustment to apply
    pub adjustment: PolicyAdjustment,
    /// Growth ratio used
    pub growth: FixedPoint,
    /// Baseline that was used (18 decimals)
    pub baseline_used: u128,
    /// True when a degenerate or thin baseline was replaced
    pub fallback: bool,
}

impl PolicyDecision {
    /// Signed basis points
    pub fn signed_bps(&self) -> i64 {
        self.adjustment.signed_bps()
    }
}

/// Evaluate the burn policy
pub fn evaluate(config: &BurnPolicyConfig, input: &PolicyInput) -> Result<PolicyDecision> {
    let average = input.baseline.average()?;
    if input.total_supply == 0 || average == 0 {
        return Ok(PolicyDecision {
            adjustment: PolicyAdjustment::Contribution(config.base_rate_bps),
            growth: FixedPoint::ZERO,
            baseline_used: average,
            fallback: true,
        });
    }

    let thin = input.baseline.denominator < input.burn_amount;
    let baseline_used = if thin { input.total_supply } else { average };
    let growth = FixedPoint::from_ratio(input.total_supply, baseline_used)?;
    let pivot = FixedPoint::from_raw(POLICY_GROWTH_PIVOT);

    let adjustment = if growth >= pivot {
        let excess = growth.saturating_sub(pivot);
        let premium = scaled_rate(config.base_rate_bps, excess)?.min(config.max_premium_bps as u128);
        PolicyAdjustment::Premium(premium as u64)
    } else {
        let shortfall = pivot.saturating_sub(growth);
        let contribution = scaled_rate(config.base_rate_bps, shortfall)?
            .clamp(config.min_contribution_bps as u128, config.max_contribution_bps as u128);
        PolicyAdjustment::Contribution(contribution as u64)
    };

    Ok(PolicyDecision {
        adjustment,
        growth,
        baseline_used,
        fallback: thin,
    })
}

fn scaled_rate(base_bps: u64, factor: FixedPoint) -> Result<u128> {
    mul_div(base_bps as u128, factor.raw(), FixedPoint::SCALE)
}
