//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.
//! Every default in [`crate::core::config`] is taken from this file.

// ═══════════════════════════════════════════════════════════════════════════════
// PRECISION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

/// Decimals of oracle prices
pub const PRICE_DECIMALS: u32 = 8;

/// Oracle price scale (1.0 USD = 100_000_000)
pub const PRICE_PRECISION: u64 = 100_000_000;

/// Decimals of every USD value in the system
pub const USD_DECIMALS: u32 = 18;

/// 18-decimal fixed point scale
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Ratio precision for collateral ratios expressed in percent
pub const RATIO_PRECISION: u64 = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// PARITY decimals
pub const PARITY_DECIMALS: u32 = 18;

/// Base unit for PARITY (1 PARITY = 10^18)
pub const PARITY_BASE_UNIT: u128 = WAD;

/// KSM decimals
pub const KSM_DECIMALS: u32 = 12;

/// DOT decimals
pub const DOT_DECIMALS: u32 = 10;

/// Stable asset decimals
pub const STABLE_DECIMALS: u32 = 6;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum number of price reporters
pub const MAX_REPORTERS: usize = 5;

/// Minimum reporter weight
pub const MIN_REPORTER_WEIGHT: u32 = 1;

/// Maximum reporter weight
pub const MAX_REPORTER_WEIGHT: u32 = 100;

/// Freshness window for per-reporter and consensus records (5 minutes)
pub const PRICE_FRESHNESS_SECS: u64 = 300;

/// Allowed stable price deviation from $1.00 (5%)
pub const STABLE_PEG_TOLERANCE_BPS: u64 = 500;

/// Maximum confidence score
pub const MAX_CONFIDENCE: u8 = 100;

/// Quorum once bootstrap mode ends
pub const FULL_QUORUM: usize = 3;

/// Reference PARITY price at a 1:1 market-cap ratio ($100, 8 decimals)
pub const DEFAULT_PARITY_PRICE_MULTIPLIER: u64 = 100 * PRICE_PRECISION;

/// Number of consensus records kept for TWAP
pub const PRICE_HISTORY_SIZE: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum collateral ratio for protected withdrawals (110%)
pub const MIN_COLLATERAL_RATIO_BPS: u64 = 11_000;

/// Minimum collateral ratio after a reserve trade (101%)
pub const TRADE_MIN_COLLATERAL_RATIO_BPS: u64 = 10_100;

/// Rounding tolerance allowed when comparing trade legs (USD, 18 decimals)
pub const TRADE_USD_EPSILON: u128 = 1_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TRADING CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Base slippage applied to every swap
pub const BASE_SLIPPAGE_BPS: u64 = 10;

/// Default slippage cap
pub const MAX_SLIPPAGE_BPS: u64 = 500;

/// Hard upper bound for the slippage cap (10%)
pub const SLIPPAGE_CAP_LIMIT_BPS: u64 = 1_000;

/// Flat swap fee
pub const SWAP_FEE_BPS: u64 = 30;

/// Slippage floor substituted when a caller passes a zero minimum output (0.1%)
pub const DEFAULT_SLIPPAGE_FLOOR_BPS: u64 = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// NAV CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Share of every mint routed to the NAV pool (10%)
pub const NAV_CONTRIBUTION_BPS: u64 = 1_000;

/// Target KSM share of the NAV pool
pub const NAV_TARGET_KSM_BPS: u64 = 300;

/// Target DOT share of the NAV pool
pub const NAV_TARGET_DOT_BPS: u64 = 300;

/// Target stable share of the NAV pool
pub const NAV_TARGET_STABLE_BPS: u64 = 9_400;

/// Deviation from target that triggers a rebalance (5%)
pub const NAV_DEVIATION_THRESHOLD_BPS: u64 = 500;

/// Minimum seconds between rebalances
pub const NAV_REBALANCE_INTERVAL_SECS: u64 = 60;

// ═══════════════════════════════════════════════════════════════════════════════
// BURN POLICY CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Base contribution / premium rate
pub const POLICY_BASE_RATE_BPS: u64 = 1_000;

/// Lowest contribution for early-growth burns
pub const POLICY_MIN_CONTRIBUTION_BPS: u64 = 100;

/// Highest contribution for early-growth burns
pub const POLICY_MAX_CONTRIBUTION_BPS: u64 = 2_000;

/// Highest premium paid from the NAV pool
pub const POLICY_MAX_PREMIUM_BPS: u64 = 1_000;

/// Growth ratio at which contributions turn into premiums (2.0)
pub const POLICY_GROWTH_PIVOT: u128 = 2 * WAD;

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Mint fee (0.3%)
pub const MINT_FEE_BPS: u64 = 30;

/// Burn fee charged in PARITY (0.3%)
pub const BURN_FEE_BPS: u64 = 30;

/// Upper bound for any protocol fee (5%)
pub const MAX_FEE_BPS: u64 = 500;

// ═══════════════════════════════════════════════════════════════════════════════
// SWEEP CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum seconds between surplus sweeps (1 hour)
pub const SWEEP_INTERVAL_SECS: u64 = 3_600;

/// Minimum surplus worth sweeping ($1, 18 decimals)
pub const MIN_SWEEP_USD: u128 = WAD;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 32;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_targets_sum_to_one() {
        assert_eq!(
            NAV_TARGET_KSM_BPS + NAV_TARGET_DOT_BPS + NAV_TARGET_STABLE_BPS,
            BPS_DIVISOR
        );
    }

    #[test]
    fn test_slippage_bounds() {
        assert!(BASE_SLIPPAGE_BPS <= MAX_SLIPPAGE_BPS);
        assert!(MAX_SLIPPAGE_BPS <= SLIPPAGE_CAP_LIMIT_BPS);
        assert!(DEFAULT_SLIPPAGE_FLOOR_BPS < BPS_DIVISOR);
    }

    #[test]
    fn test_policy_bounds() {
        assert!(POLICY_MIN_CONTRIBUTION_BPS <= POLICY_BASE_RATE_BPS);
        assert!(POLICY_BASE_RATE_BPS <= POLICY_MAX_CONTRIBUTION_BPS);
        assert!(POLICY_MAX_PREMIUM_BPS <= BPS_DIVISOR);
    }

    #[test]
    fn test_ratio_constants() {
        assert!(TRADE_MIN_COLLATERAL_RATIO_BPS < MIN_COLLATERAL_RATIO_BPS);
        assert!(MINT_FEE_BPS <= MAX_FEE_BPS);
        assert!(BURN_FEE_BPS <= MAX_FEE_BPS);
    }
}
