//! Protocol statistics and per-user positions.
//!
//! [`ProtocolCounters`] is part of the engine state and only moves on
//! committed operations. [`ProtocolStatistics`] and [`UserPosition`] are
//! read-only views assembled on demand.

use serde::{Deserialize, Serialize};

use crate::core::asset::AssetBalances;
use crate::error::Result;
use crate::policy::UserBaseline;
use crate::utils::math::safe_add;

/// Cumulative activity counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolCounters {
    /// Committed mints
    pub mint_count: u64,
    /// Committed burns and multi-burns
    pub burn_count: u64,
    /// Committed user swaps
    pub swap_count: u64,
    /// Committed transfers
    pub transfer_count: u64,
    /// PARITY minted, fees included
    pub total_minted: u128,
    /// PARITY destroyed
    pub total_burned: u128,
    /// PARITY fees sent to the surplus sink
    pub total_fee_parity: u128,
    /// Collateral paid to burners from the reserve and the NAV pool
    pub total_redeemed: AssetBalances,
}

impl ProtocolCounters {
    /// Record a committed mint
    pub fn record_mint(&mut self, gross_parity: u128, fee_parity: u128) -> Result<()> {
        self.mint_count += 1;
        self.total_minted = safe_add(self.total_minted, gross_parity)?;
        self.total_fee_parity = safe_add(self.total_fee_parity, fee_parity)?;
        Ok(())
    }

    /// Record a committed burn
    pub fn record_burn(&mut self, burned: u128, fee_parity: u128, payout: &AssetBalances) -> Result<()> {
        self.burn_count += 1;
        self.total_burned = safe_add(self.total_burned, burned)?;
        self.total_fee_parity = safe_add(self.total_fee_parity, fee_parity)?;
        self.total_redeemed.credit_all(payout)
    }
}

/// Snapshot of protocol-wide figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStatistics {
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
    /// PARITY total supply
    pub total_supply: u128,
    /// Accounts holding PARITY
    pub holder_count: usize,
    /// Reserve balances
    pub reserve_balances: AssetBalances,
    /// NAV pool holdings
    pub nav_holdings: AssetBalances,
    /// PARITY reference price, when consensus is fresh
    pub parity_price: Option<u64>,
    /// Reserve value (USD, 18 decimals), when consensus is fresh
    pub reserve_value_usd: Option<u128>,
    /// NAV pool value (USD, 18 decimals), when consensus is fresh
    pub nav_value_usd: Option<u128>,
    /// Reserve collateral ratio in basis points, when consensus is fresh
    pub collateral_ratio_bps: Option<u128>,
    /// Reserve surplus above the minimum ratio, when consensus is fresh
    pub surplus_usd: Option<u128>,
    /// Whether user operations are halted
    pub paused: bool,
    /// Registered reporters
    pub reporter_count: usize,
    /// Whether the oracle is still in bootstrap mode
    pub oracle_bootstrap: bool,
    /// Completed rebalances
    pub rebalance_count: u64,
    /// Completed surplus sweeps
    pub sweep_count: u64,
    /// USD swept so far
    pub total_swept_usd: u128,
    /// Cumulative counters
    pub counters: ProtocolCounters,
}

/// One account's view of the protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosition {
    /// PARITY balance
    pub parity_balance: u128,
    /// Collateral wallet balances
    pub collateral: AssetBalances,
    /// Activity baseline
    pub baseline: UserBaseline,
    /// Weighted average supply at mint time (18 decimals)
    pub baseline_average: u128,
    /// USD value of the PARITY balance, when consensus is fresh
    pub parity_value_usd: Option<u128>,
    /// Block of the last burn
    pub last_burn_block: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::Asset;

    #[test]
    fn test_counters_accumulate() {
        let mut counters = ProtocolCounters::default();
        counters.record_mint(1_000, 3).unwrap();
        counters.record_mint(500, 1).unwrap();
        counters
            .record_burn(400, 2, &AssetBalances::single(Asset::Stable, 7))
            .unwrap();

        assert_eq!(counters.mint_count, 2);
        assert_eq!(counters.burn_count, 1);
        assert_eq!(counters.total_minted, 1_500);
        assert_eq!(counters.total_burned, 400);
        assert_eq!(counters.total_fee_parity, 6);
        assert_eq!(counters.total_redeemed.stable, 7);
    }

    #[test]
    fn test_counters_overflow_is_error() {
        let mut counters = ProtocolCounters {
            total_minted: u128::MAX,
            ..ProtocolCounters::default()
        };
        assert!(counters.record_mint(1, 0).is_err());
    }
}
