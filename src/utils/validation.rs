//! Input validation utilities for the PARITY protocol.
//!
//! This module provides validation functions to ensure inputs meet
//! protocol requirements before processing. [`OperationContext`] bundles
//! the checks every user-facing operation runs, in the order they must run:
//! pause flag, deadline, amount, address, oracle freshness, then the
//! per-block burn guard.

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

/// Validate that an address is not the zero address
pub fn validate_address(address: &Address) -> Result<()> {
    if address.is_zero() {
        return Err(Error::ZeroAddress);
    }
    Ok(())
}

/// Validate that a deadline has not passed (the deadline second itself is allowed)
pub fn validate_deadline(deadline: u64, now: u64) -> Result<()> {
    if now > deadline {
        return Err(Error::DeadlineExceeded { deadline, now });
    }
    Ok(())
}

/// Validate a basis-point parameter against an upper bound
pub fn validate_bps(name: &str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(Error::ParameterOutOfBounds {
            name: name.into(),
            value: value as u128,
            min: 0,
            max: max as u128,
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// RATIO VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a collateral ratio in basis points
pub fn validate_collateral_ratio(current_bps: u128, minimum_bps: u64) -> Result<()> {
    if current_bps < minimum_bps as u128 {
        return Err(Error::CollateralRatioTooLow {
            current_bps,
            minimum_bps: minimum_bps as u128,
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a stable asset price lies within `tolerance_bps` of $1.00
pub fn validate_stable_peg(price: u64, tolerance_bps: u64) -> Result<()> {
    let band = (PRICE_PRECISION as u128 * tolerance_bps as u128 / BPS_DIVISOR as u128) as u64;
    let min = PRICE_PRECISION.saturating_sub(band);
    let max = PRICE_PRECISION.saturating_add(band);
    if price < min || price > max {
        return Err(Error::PegDeviation { price, min, max });
    }
    Ok(())
}

/// Validate a reporter confidence score
pub fn validate_confidence(confidence: u8) -> Result<()> {
    if confidence > MAX_CONFIDENCE {
        return Err(Error::InvalidConfidence(confidence));
    }
    Ok(())
}

/// Validate a price is usable
pub fn validate_price(name: &str, price: u64) -> Result<()> {
    if price == 0 {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: "price cannot be zero".into(),
        });
    }
    Ok(())
}

/// Validate a timestamp is within `max_age` of `current_time` (the boundary is fresh)
pub fn validate_freshness(timestamp: u64, current_time: u64, max_age: u64) -> Result<()> {
    let age = current_time.saturating_sub(timestamp);
    if age > max_age {
        return Err(Error::StalePrice { age, max_age });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATION VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validation context for user-facing mint and burn operations
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Whether the protocol is paused
    pub paused: bool,
    /// Current timestamp
    pub now: u64,
    /// Current block height
    pub block_height: u64,
    /// Outcome of the oracle freshness check
    pub oracle: std::result::Result<(), Error>,
    /// Block of the caller's previous burn, if any
    pub last_burn_block: Option<u64>,
}

impl OperationContext {
    fn validate_common(&self, amount: u128, recipient: &Address, deadline: u64) -> Result<()> {
        if self.paused {
            return Err(Error::ProtocolPaused);
        }
        validate_deadline(deadline, self.now)?;
        validate_non_zero(amount)?;
        validate_address(recipient)?;
        self.oracle.clone()
    }

    /// Validate context for minting operations
    pub fn validate_for_mint(&self, amount: u128, recipient: &Address, deadline: u64) -> Result<()> {
        self.validate_common(amount, recipient, deadline)
    }

    /// Validate context for swaps against the reserve
    pub fn validate_for_trade(&self, amount: u128, trader: &Address, deadline: u64) -> Result<()> {
        self.validate_common(amount, trader, deadline)
    }

    /// Validate context for burn operations, including the one-burn-per-block guard
    pub fn validate_for_burn(&self, amount: u128, recipient: &Address, deadline: u64) -> Result<()> {
        self.validate_common(amount, recipient, deadline)?;
        if self.last_burn_block == Some(self.block_height) {
            return Err(Error::BurnAlreadyThisBlock {
                block: self.block_height,
            });
        }
        Ok(())
    }
}
