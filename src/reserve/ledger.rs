//! Reserve ledger for PARITY collateral.
//!
//! The reserve holds the collateral backing circulating PARITY. It provides:
//! - Per-asset balances with deposit and withdrawal counters
//! - USD valuation through the shared normalization formula
//! - Collateral ratio, required value, surplus and liquidity queries
//! - Protected withdrawals (ratio-checked) and burn-path withdrawals (unchecked)
//! - Atomic two-leg trades used by the PMM engine
//!
//! ## Collateral Ratio
//!
//! `ratio_bps = reserve_usd * 10000 / (supply * parity_price)`. With zero
//! supply the ratio is reported as `u128::MAX`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::asset::{Asset, AssetBalances, AssetPrices};
use crate::core::config::ReserveConfig;
use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, PARITY_DECIMALS, RATIO_PRECISION};
use crate::utils::math::{mul_div, ratio_bps, safe_add, usd_value};
use crate::utils::validation::{validate_collateral_ratio, validate_non_zero};

/// Collateral ratio reported when no PARITY circulates
pub const INFINITE_RATIO: u128 = u128::MAX;

// ═══════════════════════════════════════════════════════════════════════════════
// VALUATION INPUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Market state a reserve query is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveValuation {
    /// Fresh consensus prices
    pub prices: AssetPrices,
    /// Circulating PARITY supply
    pub supply: u128,
    /// PARITY reference price (8 decimals)
    pub parity_price: u64,
}

impl ReserveValuation {
    /// USD value of the circulating supply
    pub fn supply_usd(&self) -> Result<u128> {
        usd_value(self.supply, self.parity_price, PARITY_DECIMALS)
    }
}

/// One reserve trade: the reserve receives `amount_in` and pays `amount_out`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveTrade {
    /// Asset flowing into the reserve
    pub asset_in: Asset,
    /// Amount flowing in
    pub amount_in: u128,
    /// Asset flowing out of the reserve
    pub asset_out: Asset,
    /// Amount flowing out
    pub amount_out: u128,
}

/// Saved reserve state for rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    balances: AssetBalances,
    total_deposits: AssetBalances,
    total_withdrawals: AssetBalances,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral reserve backing PARITY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveLedger {
    config: ReserveConfig,
    balances: AssetBalances,
    total_deposits: AssetBalances,
    total_withdrawals: AssetBalances,
}

impl ReserveLedger {
    /// Create an empty reserve
    pub fn new(config: ReserveConfig) -> Self {
        Self {
            config,
            balances: AssetBalances::ZERO,
            total_deposits: AssetBalances::ZERO,
            total_withdrawals: AssetBalances::ZERO,
        }
    }

    /// Reserve parameters
    pub fn config(&self) -> &ReserveConfig {
        &self.config
    }

    /// Mutable reserve parameters (governance)
    pub(crate) fn config_mut(&mut self) -> &mut ReserveConfig {
        &mut self.config
    }

    /// All balances
    pub fn balances(&self) -> &AssetBalances {
        &self.balances
    }

    /// Balance of one asset
    pub fn balance(&self, asset: Asset) -> u128 {
        self.balances.get(asset)
    }

    /// Cumulative deposits per asset
    pub fn total_deposits(&self) -> &AssetBalances {
        &self.total_deposits
    }

    /// Cumulative withdrawals per asset
    pub fn total_withdrawals(&self) -> &AssetBalances {
        &self.total_withdrawals
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral
    pub fn deposit(&mut self, asset: Asset, amount: u128) -> Result<()> {
        validate_non_zero(amount)?;
        self.balances.credit(asset, amount)?;
        self.total_deposits.credit(asset, amount)?;
        Ok(())
    }

    /// Withdraw collateral, keeping the minimum collateral ratio
    pub fn withdraw(&mut self, asset: Asset, amount: u128, valuation: &ReserveValuation) -> Result<()> {
        self.withdraw_batch(&AssetBalances::single(asset, amount), valuation)
    }

    /// Withdraw several assets at once, checking the ratio after all legs move
    pub fn withdraw_batch(&mut self, amounts: &AssetBalances, valuation: &ReserveValuation) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self.withdraw_batch_unchecked(amounts).and_then(|_| {
            let ratio = self.collateral_ratio_bps(valuation)?;
            validate_collateral_ratio(ratio, self.config.min_collateral_ratio_bps)
        });
        if result.is_err() {
            self.restore(snapshot);
        }
        result
    }

    /// Withdraw collateral for a redemption; no ratio check
    pub fn withdraw_for_burn(&mut self, asset: Asset, amount: u128) -> Result<()> {
        self.debit(asset, amount)
    }

    /// Withdraw several assets for a redemption; no ratio check
    pub fn withdraw_batch_for_burn(&mut self, amounts: &AssetBalances) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self.withdraw_batch_unchecked(amounts);
        if result.is_err() {
            self.restore(snapshot);
        }
        result
    }

    fn withdraw_batch_unchecked(&mut self, amounts: &AssetBalances) -> Result<()> {
        for (asset, amount) in amounts.iter() {
            if amount > 0 {
                self.debit(asset, amount)?;
            }
        }
        Ok(())
    }

    fn debit(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let available = self.balances.get(asset);
        if amount > available {
            return Err(Error::InsufficientReserve {
                asset: asset.symbol().into(),
                required: amount,
                available,
            });
        }
        self.balances.set(asset, available - amount);
        self.total_withdrawals.credit(asset, amount)
    }

    /// Execute a two-leg trade atomically.
    ///
    /// Both legs move first, then the reserve must not have lost USD value
    /// (beyond the rounding epsilon) and the collateral ratio must stay at
    /// or above the trade minimum. Any failure restores the prior balances.
    pub fn execute_trade(&mut self, trade: &ReserveTrade, valuation: &ReserveValuation) -> Result<()> {
        if trade.asset_in == trade.asset_out {
            return Err(Error::UnsupportedPair(format!(
                "{}/{}",
                trade.asset_in, trade.asset_out
            )));
        }
        validate_non_zero(trade.amount_in)?;
        validate_non_zero(trade.amount_out)?;

        let snapshot = self.snapshot();
        let result = self.apply_trade(trade, valuation);
        if result.is_err() {
            self.restore(snapshot);
        }
        result
    }

    fn apply_trade(&mut self, trade: &ReserveTrade, valuation: &ReserveValuation) -> Result<()> {
        self.deposit(trade.asset_in, trade.amount_in)?;
        self.debit(trade.asset_out, trade.amount_out)?;

        let prices = &valuation.prices;
        let input_usd = trade.asset_in.usd_value(trade.amount_in, prices.get(trade.asset_in))?;
        let output_usd = trade.asset_out.usd_value(trade.amount_out, prices.get(trade.asset_out))?;
        if safe_add(input_usd, self.config.trade_usd_epsilon)? < output_usd {
            return Err(Error::TradeValueDecreased {
                input_usd,
                output_usd,
            });
        }

        let ratio = self.collateral_ratio_bps(valuation)?;
        validate_collateral_ratio(ratio, self.config.trade_min_collateral_ratio_bps)?;

        debug!(
            asset_in = %trade.asset_in,
            amount_in = trade.amount_in,
            asset_out = %trade.asset_out,
            amount_out = trade.amount_out,
            ratio_bps = ratio,
            "Reserve trade settled"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALUATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// USD value of every balance
    pub fn total_value_usd(&self, prices: &AssetPrices) -> Result<u128> {
        self.balances.total_usd(prices)
    }

    /// Per-asset USD value, the liquidity available to redemptions
    pub fn liquidity_usd(&self, prices: &AssetPrices) -> Result<AssetBalances> {
        self.balances.usd_values(prices)
    }

    /// Aggregate USD liquidity
    pub fn available_liquidity_usd(&self, prices: &AssetPrices) -> Result<u128> {
        self.total_value_usd(prices)
    }

    /// Collateral ratio in basis points, [`INFINITE_RATIO`] with no supply
    pub fn collateral_ratio_bps(&self, valuation: &ReserveValuation) -> Result<u128> {
        let supply_usd = valuation.supply_usd()?;
        if supply_usd == 0 {
            return Ok(INFINITE_RATIO);
        }
        ratio_bps(self.total_value_usd(&valuation.prices)?, supply_usd)
    }

    /// Collateral ratio in percent, [`INFINITE_RATIO`] with no supply
    pub fn collateral_ratio(&self, valuation: &ReserveValuation) -> Result<u128> {
        let bps = self.collateral_ratio_bps(valuation)?;
        if bps == INFINITE_RATIO {
            return Ok(INFINITE_RATIO);
        }
        Ok(bps / RATIO_PRECISION as u128)
    }

    /// USD value the reserve must hold at the minimum collateral ratio
    pub fn required_usd(&self, valuation: &ReserveValuation) -> Result<u128> {
        mul_div(
            valuation.supply_usd()?,
            self.config.min_collateral_ratio_bps as u128,
            BPS_DIVISOR as u128,
        )
    }

    /// USD value above the required value
    pub fn surplus_usd(&self, valuation: &ReserveValuation) -> Result<u128> {
        let total = self.total_value_usd(&valuation.prices)?;
        Ok(total.saturating_sub(self.required_usd(valuation)?))
    }

    /// Whether the reserve meets the minimum collateral ratio
    pub fn is_healthy(&self, valuation: &ReserveValuation) -> Result<bool> {
        Ok(self.collateral_ratio_bps(valuation)? >= self.config.min_collateral_ratio_bps as u128)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROLLBACK
    // ═══════════════════════════════════════════════════════════════════════════

    /// Capture balances and counters
    pub fn snapshot(&self) -> ReserveSnapshot {
        ReserveSnapshot {
            balances: self.balances,
            total_deposits: self.total_deposits,
            total_withdrawals: self.total_withdrawals,
        }
    }

    /// Restore a captured state
    pub fn restore(&mut self, snapshot: ReserveSnapshot) {
        self.balances = snapshot.balances;
        self.total_deposits = snapshot.total_deposits;
        self.total_withdrawals = snapshot.total_withdrawals;
    }
}

impl Default for ReserveLedger {
    fn default() -> Self {
        Self::new(ReserveConfig::default())
    }
}
