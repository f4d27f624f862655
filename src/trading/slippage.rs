//! Reserve-utilization slippage curve.
//!
//! `utilization = output / reserve_of_output_asset` and
//! `slippage = min(base + utilization^2, max)`, all in basis points. The
//! quadratic term penalizes trades that deplete a large share of the
//! reserve.

use serde::{Deserialize, Serialize};

use crate::core::config::TradingConfig;
use crate::error::Result;
use crate::utils::constants::{BPS_DIVISOR, SLIPPAGE_CAP_LIMIT_BPS};
use crate::utils::validation::validate_bps;

/// Slippage curve parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageCurve {
    /// Slippage applied to every trade
    pub base_bps: u64,
    /// Cap on the total slippage
    pub max_bps: u64,
}

impl SlippageCurve {
    /// Build a curve, enforcing `base <= max <= 1000`
    pub fn new(base_bps: u64, max_bps: u64) -> Result<Self> {
        validate_bps("max_slippage_bps", max_bps, SLIPPAGE_CAP_LIMIT_BPS)?;
        validate_bps("base_slippage_bps", base_bps, max_bps)?;
        Ok(Self { base_bps, max_bps })
    }

    /// Curve taken from trading parameters
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            base_bps: config.base_slippage_bps,
            max_bps: config.max_slippage_bps,
        }
    }

    /// Share of the reserve an output would consume, in basis points
    pub fn utilization_bps(output: u128, reserve: u128) -> u128 {
        if reserve == 0 {
            return u128::MAX;
        }
        output.saturating_mul(BPS_DIVISOR as u128) / reserve
    }

    /// Slippage for paying `output` out of `reserve`
    pub fn slippage_bps(&self, output: u128, reserve: u128) -> u64 {
        let utilization = Self::utilization_bps(output, reserve);
        let penalty = utilization.saturating_mul(utilization) / BPS_DIVISOR as u128;
        let total = (self.base_bps as u128).saturating_add(penalty);
        total.min(self.max_bps as u128) as u64
    }

    /// Whether a computed rate is at either extreme of the curve
    pub fn is_anomalous(&self, slippage_bps: u64) -> bool {
        slippage_bps == 0 || slippage_bps == self.max_bps
    }
}

impl Default for SlippageCurve {
    fn default() -> Self {
        Self::from_config(&TradingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_penalty() {
        let curve = SlippageCurve::new(10, 1_000).unwrap();
        // 10% utilization: 1000^2 / 10000 = 100
        assert_eq!(curve.slippage_bps(10, 100), 110);
        // 50% utilization: 5000^2 / 10000 = 2500, capped
        assert_eq!(curve.slippage_bps(50, 100), 1_000);
        // Tiny trades pay only the base
        assert_eq!(curve.slippage_bps(1, 1_000_000), 10);
    }

    #[test]
    fn test_empty_reserve_hits_cap() {
        let curve = SlippageCurve::default();
        assert_eq!(curve.slippage_bps(1, 0), curve.max_bps);
        assert!(curve.is_anomalous(curve.max_bps));
    }

    #[test]
    fn test_bounds() {
        assert!(SlippageCurve::new(10, 1_001).is_err());
        assert!(SlippageCurve::new(600, 500).is_err());
        assert!(SlippageCurve::new(0, 0).is_ok());
    }
}
