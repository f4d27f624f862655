//! NAV accumulator.
//!
//! A side pool funded by a fixed cut of every mint. The pool:
//! - Receives contributions verbatim, in the minted asset
//! - Rebalances toward a target mix through the PMM engine
//! - Pays burn premiums (policy mode) or proportional bonuses (bonus mode)
//!
//! ## Payouts
//!
//! Premiums are USD-denominated, capped at the pool value, and paid stable
//! first, then KSM and DOT split by their USD share. Bonuses are the
//! burner's proportional share of the pool, paid stable first, then KSM and
//! DOT 50/50.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::asset::{Asset, AssetBalances, AssetPrices};
use crate::core::config::NavConfig;
use crate::error::{Error, Result};
use crate::protocol::guard::{Component, LockTable};
use crate::reserve::ledger::{ReserveLedger, ReserveValuation};
use crate::trading::pmm::{PmmEngine, SwapOrder, SwapReceipt};
use crate::utils::constants::BPS_DIVISOR;
use crate::utils::math::{mul_div, ratio_bps, safe_sub};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// How burns draw on the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavPayoutMode {
    /// Burn policy decides: positive bps contribute, negative bps pay a premium
    #[default]
    PolicyPremium,
    /// Every burn receives its proportional share of the pool
    ProportionalBonus,
}

/// Current against target share of one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDeviation {
    /// Asset
    pub asset: Asset,
    /// Held USD value
    pub value_usd: u128,
    /// Current share of the pool
    pub current_bps: u128,
    /// Target share of the pool
    pub target_bps: u64,
    /// Absolute distance from target
    pub deviation_bps: u128,
}

/// Result of a rebalance attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceOutcome {
    /// Cooldown has not elapsed
    NotDue {
        /// Earliest time of the next rebalance
        next_at: u64,
    },
    /// Every asset is within the deviation threshold
    WithinThreshold {
        /// Largest deviation observed
        max_deviation_bps: u128,
    },
    /// Swaps were executed
    Rebalanced {
        /// Settled swaps
        swaps: Vec<SwapReceipt>,
        /// Holdings after the rebalance
        holdings: AssetBalances,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAV ACCUMULATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// NAV pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavAccumulator {
    config: NavConfig,
    holdings: AssetBalances,
    total_contributions: AssetBalances,
    total_distributed: AssetBalances,
    last_rebalance: Option<u64>,
    rebalance_count: u64,
}

impl NavAccumulator {
    /// Empty pool
    pub fn new(config: NavConfig) -> Self {
        Self {
            config,
            holdings: AssetBalances::ZERO,
            total_contributions: AssetBalances::ZERO,
            total_distributed: AssetBalances::ZERO,
            last_rebalance: None,
            rebalance_count: 0,
        }
    }

    /// Pool parameters
    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Mutable pool parameters (governance)
    pub(crate) fn config_mut(&mut self) -> &mut NavConfig {
        &mut self.config
    }

    /// Held assets
    pub fn holdings(&self) -> &AssetBalances {
        &self.holdings
    }

    /// Cumulative contributions
    pub fn total_contributions(&self) -> &AssetBalances {
        &self.total_contributions
    }

    /// Cumulative payouts
    pub fn total_distributed(&self) -> &AssetBalances {
        &self.total_distributed
    }

    /// Time of the last executed rebalance
    pub fn last_rebalance(&self) -> Option<u64> {
        self.last_rebalance
    }

    /// Executed rebalances
    pub fn rebalance_count(&self) -> u64 {
        self.rebalance_count
    }

    /// Target share of an asset
    pub fn target_bps(&self, asset: Asset) -> u64 {
        match asset {
            Asset::Ksm => self.config.target_ksm_bps,
            Asset::Dot => self.config.target_dot_bps,
            Asset::Stable => self.config.target_stable_bps,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTRIBUTIONS AND VALUATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add assets to the pool
    pub fn contribute(&mut self, asset: Asset, amount: u128) -> Result<()> {
        validate_non_zero(amount)?;
        self.holdings.credit(asset, amount)?;
        self.total_contributions.credit(asset, amount)?;
        debug!(%asset, amount, "NAV contribution");
        Ok(())
    }

    /// Per-asset USD value
    pub fn value_breakdown(&self, prices: &AssetPrices) -> Result<AssetBalances> {
        self.holdings.usd_values(prices)
    }

    /// Pool USD value, the exact sum of the per-asset values
    pub fn total_value_usd(&self, prices: &AssetPrices) -> Result<u128> {
        self.value_breakdown(prices)?.sum()
    }

    /// Current mix against the target mix
    pub fn deviation_report(&self, prices: &AssetPrices) -> Result<Vec<AssetDeviation>> {
        let values = self.value_breakdown(prices)?;
        let total = values.sum()?;
        Asset::ALL
            .iter()
            .map(|&asset| {
                let value_usd = values.get(asset);
                let current_bps = ratio_bps(value_usd, total)?;
                let target_bps = self.target_bps(asset);
                Ok(AssetDeviation {
                    asset,
                    value_usd,
                    current_bps,
                    target_bps,
                    deviation_bps: current_bps.abs_diff(target_bps as u128),
                })
            })
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PAYOUTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Assets paying a USD premium, capped at the pool value
    pub fn plan_premium(&self, premium_usd: u128, prices: &AssetPrices) -> Result<AssetBalances> {
        let values = self.value_breakdown(prices)?;
        let capped = premium_usd.min(values.sum()?);

        let mut plan = AssetBalances::ZERO;
        let stable_usd = capped.min(values.stable);
        self.take(&mut plan, Asset::Stable, stable_usd, prices)?;

        let remaining = capped - stable_usd;
        let volatile_usd = values.ksm.saturating_add(values.dot);
        if remaining > 0 && volatile_usd > 0 {
            let ksm_usd = mul_div(remaining, values.ksm, volatile_usd)?;
            let dot_usd = remaining.saturating_sub(ksm_usd);
            self.take(&mut plan, Asset::Ksm, ksm_usd.min(values.ksm), prices)?;
            self.take(&mut plan, Asset::Dot, dot_usd.min(values.dot), prices)?;
        }
        Ok(plan)
    }

    /// Assets paying the proportional bonus `parity_amount / supply` of the pool
    pub fn plan_bonus(&self, parity_amount: u128, supply: u128, prices: &AssetPrices) -> Result<AssetBalances> {
        if supply == 0 || parity_amount == 0 {
            return Ok(AssetBalances::ZERO);
        }
        let values = self.value_breakdown(prices)?;
        let bonus_usd = mul_div(values.sum()?, parity_amount.min(supply), supply)?;

        let mut plan = AssetBalances::ZERO;
        let stable_usd = bonus_usd.min(values.stable);
        self.take(&mut plan, Asset::Stable, stable_usd, prices)?;

        let remaining = bonus_usd - stable_usd;
        if remaining > 0 {
            let half = remaining / 2;
            let mut ksm_usd = half.min(values.ksm);
            let mut dot_usd = (remaining - half).min(values.dot);
            // A short side spills onto the other
            let shortfall = remaining - ksm_usd - dot_usd;
            if shortfall > 0 {
                let extra_ksm = shortfall.min(values.ksm - ksm_usd);
                ksm_usd += extra_ksm;
                dot_usd += (shortfall - extra_ksm).min(values.dot - dot_usd);
            }
            self.take(&mut plan, Asset::Ksm, ksm_usd, prices)?;
            self.take(&mut plan, Asset::Dot, dot_usd, prices)?;
        }
        Ok(plan)
    }

    fn take(&self, plan: &mut AssetBalances, asset: Asset, usd: u128, prices: &AssetPrices) -> Result<()> {
        if usd == 0 {
            return Ok(());
        }
        let amount = asset
            .amount_for_usd(usd, prices.get(asset))?
            .min(self.holdings.get(asset));
        plan.set(asset, amount);
        Ok(())
    }

    /// Pay out a planned set of assets
    pub fn distribute(&mut self, payout: &AssetBalances) -> Result<()> {
        for (asset, amount) in payout.iter() {
            let available = self.holdings.get(asset);
            if amount > available {
                return Err(Error::InsufficientNavHoldings {
                    asset: asset.symbol().into(),
                    required: amount,
                    available,
                });
            }
        }
        for (asset, amount) in payout.iter() {
            if amount > 0 {
                self.holdings.set(asset, self.holdings.get(asset) - amount);
                self.total_distributed.credit(asset, amount)?;
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REBALANCING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Earliest time of the next rebalance
    pub fn next_rebalance_at(&self) -> u64 {
        self.last_rebalance
            .map(|t| t.saturating_add(self.config.rebalance_interval_secs))
            .unwrap_or(0)
    }

    /// Swap the pool toward its target mix through the PMM engine.
    ///
    /// A failed swap restores the pool, the reserve and the PMM state to
    /// what they were before the call.
    pub fn rebalance(
        &mut self,
        pmm: &mut PmmEngine,
        reserve: &mut ReserveLedger,
        valuation: &ReserveValuation,
        locks: &LockTable,
        now: u64,
    ) -> Result<RebalanceOutcome> {
        let next_at = self.next_rebalance_at();
        if now < next_at {
            return Ok(RebalanceOutcome::NotDue { next_at });
        }

        let report = self.deviation_report(&valuation.prices)?;
        let max_deviation_bps = report.iter().map(|d| d.deviation_bps).max().unwrap_or(0);
        let total: u128 = report.iter().map(|d| d.value_usd).sum();
        if total == 0 || max_deviation_bps <= self.config.deviation_threshold_bps as u128 {
            return Ok(RebalanceOutcome::WithinThreshold { max_deviation_bps });
        }

        let _nav = locks.acquire(Component::Nav)?;
        let holdings_before = self.holdings;
        let reserve_before = reserve.snapshot();
        let pmm_before = pmm.clone();

        match self.execute_rebalance(pmm, reserve, valuation, locks, &report, total) {
            Ok(swaps) => {
                self.last_rebalance = Some(now);
                self.rebalance_count += 1;
                info!(swaps = swaps.len(), max_deviation_bps, "NAV rebalanced");
                Ok(RebalanceOutcome::Rebalanced {
                    swaps,
                    holdings: self.holdings,
                })
            }
            Err(e) => {
                self.holdings = holdings_before;
                reserve.restore(reserve_before);
                *pmm = pmm_before;
                warn!(error = %e, "NAV rebalance failed, holdings restored");
                Err(Error::RebalanceFailed(e.to_string()))
            }
        }
    }

    fn execute_rebalance(
        &mut self,
        pmm: &mut PmmEngine,
        reserve: &mut ReserveLedger,
        valuation: &ReserveValuation,
        locks: &LockTable,
        report: &[AssetDeviation],
        total: u128,
    ) -> Result<Vec<SwapReceipt>> {
        let mut excess: Vec<(Asset, u128)> = Vec::new();
        let mut deficit: Vec<(Asset, u128)> = Vec::new();
        for d in report {
            let target_usd = mul_div(total, d.target_bps as u128, BPS_DIVISOR as u128)?;
            if d.value_usd > target_usd {
                excess.push((d.asset, d.value_usd - target_usd));
            } else if target_usd > d.value_usd {
                deficit.push((d.asset, target_usd - d.value_usd));
            }
        }
        excess.sort_by(|a, b| b.1.cmp(&a.1));
        deficit.sort_by(|a, b| b.1.cmp(&a.1));

        let prices = &valuation.prices;
        let mut swaps = Vec::new();
        for (buy, needed) in deficit.iter_mut() {
            for (sell, spare) in excess.iter_mut() {
                let usd = (*needed).min(*spare);
                if usd == 0 {
                    continue;
                }
                let amount_in = sell
                    .amount_for_usd(usd, prices.get(*sell))?
                    .min(self.holdings.get(*sell));
                if amount_in == 0 {
                    continue;
                }

                self.holdings.debit(*sell, amount_in)?;
                let order = SwapOrder {
                    asset_in: *sell,
                    amount_in,
                    asset_out: *buy,
                    min_output: 0,
                };
                let receipt = pmm.swap(reserve, &order, valuation, locks)?;
                self.holdings.credit(*buy, receipt.quote.output_amount)?;

                *needed = safe_sub(*needed, usd)?;
                *spare = safe_sub(*spare, usd)?;
                swaps.push(receipt);
            }
        }
        Ok(swaps)
    }
}

impl Default for NavAccumulator {
    fn default() -> Self {
        Self::new(NavConfig::default())
    }
}
