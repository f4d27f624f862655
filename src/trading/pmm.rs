//! Proactive market maker over the reserve.
//!
//! Swaps are priced at the oracle consensus, then reduced by the
//! utilization slippage and a flat fee:
//!
//! ```text
//! gross  = usd(amount_in) converted to asset_out
//! net    = gross - gross * slippage_bps - gross * fee_bps
//! ```
//!
//! Settlement is two-phase. The input leg is first held in escrow, then
//! the reserve executes the trade atomically. If the reserve rejects the
//! trade, the escrow is released back and nothing else has moved.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::asset::{Asset, AssetBalances};
use crate::core::config::TradingConfig;
use crate::error::{Error, Result};
use crate::protocol::guard::{Component, LockTable};
use crate::reserve::ledger::{ReserveLedger, ReserveTrade, ReserveValuation};
use crate::trading::slippage::SlippageCurve;
use crate::utils::math::{amount_after_fee, bps_of, safe_sub};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// QUOTES
// ═══════════════════════════════════════════════════════════════════════════════

/// Priced swap, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmmQuote {
    /// Asset paid in
    pub asset_in: Asset,
    /// Amount paid in
    pub amount_in: u128,
    /// Asset paid out
    pub asset_out: Asset,
    /// Output at the oracle price
    pub gross_output: u128,
    /// Applied slippage rate
    pub slippage_bps: u64,
    /// Output withheld as slippage
    pub slippage_amount: u128,
    /// Output withheld as fee
    pub fee_amount: u128,
    /// Output delivered
    pub output_amount: u128,
}

/// Swap against the reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOrder {
    /// Asset paid in
    pub asset_in: Asset,
    /// Amount paid in
    pub amount_in: u128,
    /// Asset wanted
    pub asset_out: Asset,
    /// Minimum acceptable output; zero selects the default floor
    pub min_output: u128,
}

/// Settled swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
    /// Quote the swap settled at
    pub quote: PmmQuote,
    /// Minimum output that was enforced
    pub min_output: u128,
    /// Slippage was zero or pinned at the cap
    pub anomalous: bool,
}

/// Cumulative trading statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmmStats {
    /// Settled swaps
    pub swap_count: u64,
    /// Input volume per asset
    pub volume_in: AssetBalances,
    /// Output volume per asset
    pub volume_out: AssetBalances,
    /// Fees retained per asset
    pub fees: AssetBalances,
    /// Swaps with anomalous slippage
    pub anomaly_count: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PMM ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// PMM trading engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmmEngine {
    config: TradingConfig,
    escrow: AssetBalances,
    stats: PmmStats,
}

impl PmmEngine {
    /// Create an engine
    pub fn new(config: TradingConfig) -> Self {
        Self {
            config,
            escrow: AssetBalances::ZERO,
            stats: PmmStats::default(),
        }
    }

    /// Trading parameters
    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Mutable trading parameters (governance)
    pub(crate) fn config_mut(&mut self) -> &mut TradingConfig {
        &mut self.config
    }

    /// Current slippage curve
    pub fn curve(&self) -> SlippageCurve {
        SlippageCurve::from_config(&self.config)
    }

    /// Input held between collection and settlement
    pub fn escrow(&self) -> &AssetBalances {
        &self.escrow
    }

    /// Trading statistics
    pub fn stats(&self) -> &PmmStats {
        &self.stats
    }

    /// Price a swap against current reserve balances
    pub fn quote(
        &self,
        reserve: &ReserveLedger,
        asset_in: Asset,
        amount_in: u128,
        asset_out: Asset,
        valuation: &ReserveValuation,
    ) -> Result<PmmQuote> {
        if asset_in == asset_out {
            return Err(Error::UnsupportedPair(format!("{}/{}", asset_in, asset_out)));
        }
        validate_non_zero(amount_in)?;

        let prices = &valuation.prices;
        let input_usd = asset_in.usd_value(amount_in, prices.get(asset_in))?;
        let gross_output = asset_out.amount_for_usd(input_usd, prices.get(asset_out))?;

        let slippage_bps = self
            .curve()
            .slippage_bps(gross_output, reserve.balance(asset_out));
        let slippage_amount = bps_of(gross_output, slippage_bps)?;
        let fee_amount = bps_of(gross_output, self.config.swap_fee_bps)?;
        let output_amount = safe_sub(safe_sub(gross_output, slippage_amount)?, fee_amount)?;

        debug!(
            %asset_in,
            amount_in,
            %asset_out,
            gross_output,
            slippage_bps,
            output_amount,
            "PMM quote"
        );

        Ok(PmmQuote {
            asset_in,
            amount_in,
            asset_out,
            gross_output,
            slippage_bps,
            slippage_amount,
            fee_amount,
            output_amount,
        })
    }

    /// Minimum output enforced for a caller-supplied minimum.
    ///
    /// A zero minimum falls back to the execution quote less the default
    /// floor. Quote and settlement share one transaction, so that fallback
    /// only rejects a zero output; callers wanting protection against the
    /// curve itself pass their own minimum.
    pub fn effective_min_output(&self, quoted_output: u128, min_output: u128) -> Result<u128> {
        if min_output > 0 {
            return Ok(min_output);
        }
        amount_after_fee(quoted_output, self.config.default_slippage_floor_bps)
    }

    /// Execute a swap. The caller has already collected `amount_in` and
    /// delivers `output_amount` of the receipt on success.
    pub fn swap(
        &mut self,
        reserve: &mut ReserveLedger,
        order: &SwapOrder,
        valuation: &ReserveValuation,
        locks: &LockTable,
    ) -> Result<SwapReceipt> {
        let _pmm = locks.acquire(Component::Pmm)?;

        let quote = self.quote(reserve, order.asset_in, order.amount_in, order.asset_out, valuation)?;
        let min_output = self.effective_min_output(quote.output_amount, order.min_output)?;
        if quote.output_amount < min_output || quote.output_amount == 0 {
            return Err(Error::SlippageExceeded {
                minimum: min_output,
                actual: quote.output_amount,
            });
        }

        // Phase one: hold the input
        self.escrow.credit(order.asset_in, order.amount_in)?;

        // Phase two: the reserve pulls the input and pushes the output
        let trade = ReserveTrade {
            asset_in: order.asset_in,
            amount_in: order.amount_in,
            asset_out: order.asset_out,
            amount_out: quote.output_amount,
        };
        let settled = locks
            .acquire(Component::Reserve)
            .and_then(|_reserve| reserve.execute_trade(&trade, valuation));
        self.escrow.debit(order.asset_in, order.amount_in)?;
        settled?;

        let anomalous = self.curve().is_anomalous(quote.slippage_bps);
        if anomalous {
            self.stats.anomaly_count += 1;
            warn!(
                slippage_bps = quote.slippage_bps,
                asset_out = %order.asset_out,
                "Anomalous PMM slippage"
            );
        }
        self.stats.swap_count += 1;
        self.stats.volume_in.credit(order.asset_in, order.amount_in)?;
        self.stats.volume_out.credit(order.asset_out, quote.output_amount)?;
        self.stats.fees.credit(order.asset_out, quote.fee_amount)?;

        info!(
            asset_in = %order.asset_in,
            amount_in = order.amount_in,
            asset_out = %order.asset_out,
            amount_out = quote.output_amount,
            slippage_bps = quote.slippage_bps,
            "Swap settled"
        );

        Ok(SwapReceipt {
            quote,
            min_output,
            anomalous,
        })
    }
}

impl Default for PmmEngine {
    fn default() -> Self {
        Self::new(TradingConfig::default())
    }
}
