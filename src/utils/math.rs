//! Fixed-point arithmetic and mathematical utilities.
//!
//! Every product of two protocol quantities is computed through a 256-bit
//! intermediate so that no step can overflow before the final division.
//! The USD normalization used by every component lives here:
//!
//! ```text
//! usd = amount * price * 1e18 / 10^(decimals + 8)
//! ```

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, PRICE_DECIMALS, WAD};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places precision
/// Used for growth ratios, market-cap ratios and other dimensionless values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FixedPoint(u128);

impl FixedPoint {
    /// Scale factor: 10^18
    pub const SCALE: u128 = WAD;

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    /// Create a new FixedPoint from raw value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from an integer (scales up)
    pub fn from_integer(value: u64) -> Self {
        Self((value as u128) * Self::SCALE)
    }

    /// Create from basis points (100 bps = 1%)
    pub fn from_bps(bps: u64) -> Self {
        Self((bps as u128) * Self::SCALE / (BPS_DIVISOR as u128))
    }

    /// Ratio `numerator / denominator`, floor rounded
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self> {
        mul_div(numerator, Self::SCALE, denominator).map(Self)
    }

    /// Get the raw underlying value
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Apply this ratio to an integer quantity, floor rounded
    pub fn apply(&self, value: u128) -> Result<u128> {
        mul_div(value, self.0, Self::SCALE)
    }

    /// Checked product of two fixed-point values
    pub fn checked_mul(&self, other: Self) -> Result<Self> {
        mul_div(self.0, other.0, Self::SCALE).map(Self)
    }

    /// Checked quotient of two fixed-point values
    pub fn checked_div(&self, other: Self) -> Result<Self> {
        mul_div(self.0, Self::SCALE, other.0).map(Self)
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction
    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Minimum of two values
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Maximum of two values
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

impl Add for FixedPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for FixedPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:018}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> Result<u128> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

fn narrow(value: U256, operation: impl FnOnce() -> String) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: operation(),
        });
    }
    Ok(value.low_u128())
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding down
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    narrow(result, || format!("({} * {}) / {}", a, b, c))
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding up
pub fn mul_div_up(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let numerator = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let result = (numerator + divisor - U256::one()) / divisor;
    narrow(result, || format!("ceil(({} * {}) / {})", a, b, c))
}

// ═══════════════════════════════════════════════════════════════════════════════
// USD NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// USD value (18 decimals) of `amount` base units priced at `price` (8 decimals)
pub fn usd_value(amount: u128, price: u64, decimals: u32) -> Result<u128> {
    let numerator = U256::from(amount) * U256::from(price) * U256::from(WAD);
    let denominator = U256::exp10((decimals + PRICE_DECIMALS) as usize);
    narrow(numerator / denominator, || {
        format!("usd_value({}, {}, {})", amount, price, decimals)
    })
}

/// Base units of an asset worth `usd` (18 decimals) at `price`, rounding down
pub fn amount_from_usd(usd: u128, price: u64, decimals: u32) -> Result<u128> {
    if price == 0 {
        return Err(Error::InvalidParameter {
            name: "price".into(),
            reason: "cannot be zero".into(),
        });
    }
    let numerator = U256::from(usd) * U256::exp10((decimals + PRICE_DECIMALS) as usize);
    let denominator = U256::from(price) * U256::from(WAD);
    narrow(numerator / denominator, || {
        format!("amount_from_usd({}, {}, {})", usd, price, decimals)
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Portion of `amount` given by `bps`, rounding down
pub fn bps_of(amount: u128, bps: u64) -> Result<u128> {
    mul_div(amount, bps as u128, BPS_DIVISOR as u128)
}

/// Calculate amount after fee deduction
pub fn amount_after_fee(amount: u128, fee_bps: u64) -> Result<u128> {
    let fee = bps_of(amount, fee_bps)?;
    safe_sub(amount, fee)
}

/// Ratio of `part` to `whole` in basis points, rounding down (zero whole yields zero)
pub fn ratio_bps(part: u128, whole: u128) -> Result<u128> {
    if whole == 0 {
        return Ok(0);
    }
    mul_div(part, BPS_DIVISOR as u128, whole)
}

// ═══════════════════════════════════════════════════════════════════════════════
// UTILITY FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Check if a value is within basis-point deviation of a target
pub fn within_deviation(value: u128, target: u128, max_deviation_bps: u64) -> bool {
    if target == 0 {
        return value == 0;
    }
    let diff = value.abs_diff(target);
    let deviation = U256::from(diff) * U256::from(BPS_DIVISOR) / U256::from(target);
    deviation <= U256::from(max_deviation_bps)
}

/// Weighted average of `(value, weight)` pairs, rounding down
pub fn weighted_average<I>(pairs: I) -> Result<Option<u128>>
where
    I: IntoIterator<Item = (u128, u128)>,
{
    let mut sum = U256::zero();
    let mut total_weight = U256::zero();
    for (value, weight) in pairs {
        sum += U256::from(value) * U256::from(weight);
        total_weight += U256::from(weight);
    }
    if total_weight.is_zero() {
        return Ok(None);
    }
    narrow(sum / total_weight, || "weighted_average".to_string()).map(Some)
}
