//! Surplus sweeper.
//!
//! Over-collateralization above the minimum ratio is periodically drained
//! to a sink account. The withdrawal plan is deterministic:
//! 1. Stable asset first
//! 2. Then whichever of KSM and DOT holds more USD value (KSM on a tie)
//! 3. Then the other one
//!
//! Each leg is floor-converted, so the swept value never exceeds the surplus
//! and the reserve stays at or above the minimum ratio.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::asset::{Asset, AssetBalances, AssetPrices};
use crate::core::config::SweepConfig;
use crate::error::{Error, Result};
use crate::reserve::ledger::{ReserveLedger, ReserveValuation};
use crate::utils::crypto::Address;

/// Assets to withdraw so that their USD value is at most `surplus_usd`
pub fn plan_surplus_withdrawal(
    balances: &AssetBalances,
    prices: &AssetPrices,
    surplus_usd: u128,
) -> Result<AssetBalances> {
    let values = balances.usd_values(prices)?;
    let (first, second) = if values.ksm >= values.dot {
        (Asset::Ksm, Asset::Dot)
    } else {
        (Asset::Dot, Asset::Ksm)
    };

    let mut remaining = surplus_usd;
    let mut plan = AssetBalances::ZERO;
    for asset in [Asset::Stable, first, second] {
        if remaining == 0 {
            break;
        }
        let take_usd = remaining.min(values.get(asset));
        if take_usd == 0 {
            continue;
        }
        let amount = asset
            .amount_for_usd(take_usd, prices.get(asset))?
            .min(balances.get(asset));
        if amount == 0 {
            continue;
        }
        plan.set(asset, amount);
        let taken = asset.usd_value(amount, prices.get(asset))?;
        remaining = remaining.saturating_sub(taken);
    }
    Ok(plan)
}

/// Outcome of a sweep attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepOutcome {
    /// Interval since the last sweep has not elapsed
    NotDue {
        /// Earliest time the next sweep may run
        next_at: u64,
    },
    /// Surplus is under the configured threshold
    BelowThreshold {
        /// Current surplus (USD, 18 decimals)
        surplus_usd: u128,
    },
    /// Surplus was withdrawn for the sink
    Swept {
        /// Assets withdrawn from the reserve
        withdrawn: AssetBalances,
        /// USD value withdrawn
        value_usd: u128,
        /// Recipient of the withdrawn assets
        sink: Address,
    },
}

/// Sweeper bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusSweeper {
    last_sweep: Option<u64>,
    sweep_count: u64,
    total_swept_usd: u128,
}

impl SurplusSweeper {
    /// Fresh sweeper
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the last sweep
    pub fn last_sweep(&self) -> Option<u64> {
        self.last_sweep
    }

    /// Completed sweeps
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    /// USD value swept so far
    pub fn total_swept_usd(&self) -> u128 {
        self.total_swept_usd
    }

    /// Earliest time the next sweep may run
    pub fn next_sweep_at(&self, config: &SweepConfig) -> u64 {
        self.last_sweep
            .map(|t| t.saturating_add(config.interval_secs))
            .unwrap_or(0)
    }

    /// Withdraw the reserve surplus if due. The caller credits the sink.
    pub fn sweep(
        &mut self,
        reserve: &mut ReserveLedger,
        valuation: &ReserveValuation,
        config: &SweepConfig,
        now: u64,
    ) -> Result<SweepOutcome> {
        let next_at = self.next_sweep_at(config);
        if now < next_at {
            return Ok(SweepOutcome::NotDue { next_at });
        }

        let surplus_usd = reserve.surplus_usd(valuation)?;
        if surplus_usd == 0 || surplus_usd < config.min_surplus_usd {
            return Ok(SweepOutcome::BelowThreshold { surplus_usd });
        }

        let withdrawn = plan_surplus_withdrawal(reserve.balances(), &valuation.prices, surplus_usd)?;
        if withdrawn.is_empty() {
            return Ok(SweepOutcome::BelowThreshold { surplus_usd });
        }
        reserve
            .withdraw_batch(&withdrawn, valuation)
            .map_err(|e| Error::SweepFailed(e.to_string()))?;

        let value_usd = withdrawn.total_usd(&valuation.prices)?;
        self.last_sweep = Some(now);
        self.sweep_count += 1;
        self.total_swept_usd = self.total_swept_usd.saturating_add(value_usd);

        info!(value_usd, sink = %config.sink.short(), "Surplus swept");
        Ok(SweepOutcome::Swept {
            withdrawn,
            value_usd,
            sink: config.sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{DOT_DECIMALS, KSM_DECIMALS, PRICE_PRECISION, STABLE_DECIMALS, WAD};

    fn prices() -> AssetPrices {
        AssetPrices {
            ksm: 20 * PRICE_PRECISION,
            dot: 5 * PRICE_PRECISION,
            stable: PRICE_PRECISION,
        }
    }

    fn valuation(supply_tokens: u128) -> ReserveValuation {
        ReserveValuation {
            prices: prices(),
            supply: supply_tokens * WAD,
            parity_price: 2 * PRICE_PRECISION,
        }
    }

    #[test]
    fn test_plan_prefers_stable() {
        let balances = AssetBalances {
            ksm: 10 * 10u128.pow(KSM_DECIMALS),
            dot: 10 * 10u128.pow(DOT_DECIMALS),
            stable: 50 * 10u128.pow(STABLE_DECIMALS),
        };
        let plan = plan_surplus_withdrawal(&balances, &prices(), 30 * WAD).unwrap();
        assert_eq!(plan, AssetBalances::single(Asset::Stable, 30 * 10u128.pow(STABLE_DECIMALS)));
    }

    #[test]
    fn test_plan_spills_to_larger_asset() {
        // KSM $200, DOT $50, stable $10
        let balances = AssetBalances {
            ksm: 10 * 10u128.pow(KSM_DECIMALS),
            dot: 10 * 10u128.pow(DOT_DECIMALS),
            stable: 10 * 10u128.pow(STABLE_DECIMALS),
        };
        let plan = plan_surplus_withdrawal(&balances, &prices(), 50 * WAD).unwrap();
        assert_eq!(plan.stable, 10 * 10u128.pow(STABLE_DECIMALS));
        assert_eq!(plan.ksm, 2 * 10u128.pow(KSM_DECIMALS));
        assert_eq!(plan.dot, 0);
    }

    #[test]
    fn test_plan_tie_breaks_to_ksm() {
        // KSM $100, DOT $100
        let balances = AssetBalances {
            ksm: 5 * 10u128.pow(KSM_DECIMALS),
            dot: 20 * 10u128.pow(DOT_DECIMALS),
            stable: 0,
        };
        let plan = plan_surplus_withdrawal(&balances, &prices(), 20 * WAD).unwrap();
        assert_eq!(plan, AssetBalances::single(Asset::Ksm, 10u128.pow(KSM_DECIMALS)));
    }

    #[test]
    fn test_sweep_and_cooldown() {
        let mut reserve = ReserveLedger::default();
        reserve.deposit(Asset::Stable, 1_300 * 10u128.pow(STABLE_DECIMALS)).unwrap();
        let config = SweepConfig::default();
        let mut sweeper = SurplusSweeper::new();
        let v = valuation(500);

        let outcome = sweeper.sweep(&mut reserve, &v, &config, 10_000).unwrap();
        match outcome {
            SweepOutcome::Swept { withdrawn, value_usd, sink } => {
                assert_eq!(withdrawn.stable, 200 * 10u128.pow(STABLE_DECIMALS));
                assert_eq!(value_usd, 200 * WAD);
                assert_eq!(sink, config.sink);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(reserve.collateral_ratio_bps(&v).unwrap(), 11_000);

        let again = sweeper.sweep(&mut reserve, &v, &config, 10_000).unwrap();
        assert_eq!(again, SweepOutcome::NotDue { next_at: 10_000 + config.interval_secs });
        assert_eq!(sweeper.sweep_count(), 1);
    }

    #[test]
    fn test_sweep_below_threshold() {
        let mut reserve = ReserveLedger::default();
        reserve.deposit(Asset::Stable, 1_100 * 10u128.pow(STABLE_DECIMALS)).unwrap();
        let mut sweeper = SurplusSweeper::new();
        let before = reserve.clone();

        let outcome = sweeper
            .sweep(&mut reserve, &valuation(500), &SweepConfig::default(), 10)
            .unwrap();
        assert_eq!(outcome, SweepOutcome::BelowThreshold { surplus_usd: 0 });
        assert_eq!(reserve, before);
        assert_eq!(sweeper.last_sweep(), None);
    }
}
