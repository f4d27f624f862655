//! Error types for the PARITY protocol.
//!
//! This module defines all error types used throughout the protocol,
//! together with the coarse [`ErrorCategory`] every error belongs to.
//! Categories decide how the orchestrator treats a failure: validation,
//! staleness and solvency errors abort the whole operation, maintenance
//! errors are logged and swallowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for PARITY operations
pub type Result<T> = std::result::Result<T, Error>;

/// How a failure is surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Bad input, rejected before any state change
    Validation,
    /// Oracle data missing or too old
    Staleness,
    /// Reserves, liquidity or collateral ratio insufficient
    Solvency,
    /// Best-effort maintenance failure (rebalance, sweep)
    Maintenance,
    /// Caller lacks the required capability
    Authorization,
    /// Arithmetic, locking, storage or invariant failures
    Internal,
}

/// Main error type for the PARITY protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Solvency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Reserve does not hold enough of an asset
    #[error("Insufficient {asset} reserve: required {required}, available {available}")]
    InsufficientReserve {
        /// Asset symbol
        asset: String,
        /// Required amount in base units
        required: u128,
        /// Available amount in base units
        available: u128,
    },

    /// Collateral ratio would drop below the configured minimum
    #[error("Collateral ratio {current_bps} bps below minimum {minimum_bps} bps")]
    CollateralRatioTooLow {
        /// Ratio after the operation, in basis points
        current_bps: u128,
        /// Minimum ratio, in basis points
        minimum_bps: u128,
    },

    /// Aggregate liquidity cannot cover a multi-asset redemption
    #[error("Insufficient liquidity: required ${required_usd}, available ${available_usd} (18 decimals)")]
    InsufficientLiquidity {
        /// Requested USD value
        required_usd: u128,
        /// Available USD value
        available_usd: u128,
    },

    /// NAV pool cannot cover a payout in the requested asset
    #[error("Insufficient NAV {asset} holdings: required {required}, available {available}")]
    InsufficientNavHoldings {
        /// Asset symbol
        asset: String,
        /// Required amount
        required: u128,
        /// Available amount
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Trading Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Output below the caller's minimum
    #[error("Slippage exceeded: minimum output {minimum}, actual {actual}")]
    SlippageExceeded {
        /// Minimum acceptable output
        minimum: u128,
        /// Output the trade would deliver
        actual: u128,
    },

    /// Trade would reduce reserve USD value
    #[error("Trade decreases reserve value: input ${input_usd}, output ${output_usd}")]
    TradeValueDecreased {
        /// USD value received by the reserve
        input_usd: u128,
        /// USD value paid out by the reserve
        output_usd: u128,
    },

    /// Asset pair cannot be traded
    #[error("Unsupported trading pair: {0}")]
    UnsupportedPair(String),

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Consensus record is older than the freshness window
    #[error("Price is stale: last update {age}s ago, max allowed {max_age}s")]
    StalePrice {
        /// Seconds since the consensus record was produced
        age: u64,
        /// Freshness window in seconds
        max_age: u64,
    },

    /// No valid consensus record has been produced yet
    #[error("No valid price consensus")]
    NoConsensus,

    /// Stable asset price outside the allowed peg band
    #[error("Stable price {price} outside peg band [{min}, {max}]")]
    PegDeviation {
        /// Submitted price (8 decimals)
        price: u64,
        /// Lowest accepted price
        min: u64,
        /// Highest accepted price
        max: u64,
    },

    /// Confidence score above 100
    #[error("Invalid confidence score {0}, must be at most 100")]
    InvalidConfidence(u8),

    /// Submitter is not a registered reporter
    #[error("Unknown price reporter: {0}")]
    UnknownReporter(String),

    /// Reporter already registered
    #[error("Price reporter already registered: {0}")]
    ReporterExists(String),

    /// Reporter registry is full
    #[error("Reporter limit reached: maximum {max}")]
    ReporterLimitReached {
        /// Maximum number of reporters
        max: usize,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller lacks a capability
    #[error("Not authorized: {caller} lacks {capability}")]
    Unauthorized {
        /// Caller address (hex)
        caller: String,
        /// Missing capability
        capability: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Parameter outside its allowed range
    #[error("Parameter {name} value {value} outside [{min}, {max}]")]
    ParameterOutOfBounds {
        /// Parameter name
        name: String,
        /// Proposed value
        value: u128,
        /// Lower bound
        min: u128,
        /// Upper bound
        max: u128,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// The all-zero address was supplied
    #[error("Zero address not allowed")]
    ZeroAddress,

    /// Operation submitted after its deadline
    #[error("Deadline exceeded: deadline {deadline}, now {now}")]
    DeadlineExceeded {
        /// Caller supplied deadline
        deadline: u64,
        /// Current timestamp
        now: u64,
    },

    /// Account balance too small
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Required amount
        required: u128,
        /// Available amount
        available: u128,
    },

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Protocol Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Protocol is paused
    #[error("Protocol is paused")]
    ProtocolPaused,

    /// User already burned in this block
    #[error("Account already burned in block {block}")]
    BurnAlreadyThisBlock {
        /// Block height of the previous burn
        block: u64,
    },

    /// Component entered while already locked
    #[error("Reentrant call into {0}")]
    Reentrancy(String),

    /// Component locks acquired out of rank order
    #[error("Lock order violation: {requested} requested while holding {held}")]
    LockOrderViolation {
        /// Highest ranked component already held
        held: String,
        /// Component being acquired
        requested: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Maintenance Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Rebalance swap failed, holdings restored
    #[error("Rebalance failed: {0}")]
    RebalanceFailed(String),

    /// Surplus sweep failed
    #[error("Surplus sweep failed: {0}")]
    SweepFailed(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the category deciding how this error is surfaced
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InsufficientReserve { .. }
            | Error::CollateralRatioTooLow { .. }
            | Error::InsufficientLiquidity { .. }
            | Error::InsufficientNavHoldings { .. }
            | Error::SlippageExceeded { .. }
            | Error::TradeValueDecreased { .. } => ErrorCategory::Solvency,

            Error::StalePrice { .. } | Error::NoConsensus => ErrorCategory::Staleness,

            Error::Unauthorized { .. } | Error::UnknownReporter(_) => ErrorCategory::Authorization,

            Error::RebalanceFailed(_) | Error::SweepFailed(_) => ErrorCategory::Maintenance,

            Error::UnsupportedPair(_)
            | Error::PegDeviation { .. }
            | Error::InvalidConfidence(_)
            | Error::ReporterExists(_)
            | Error::ReporterLimitReached { .. }
            | Error::InvalidParameter { .. }
            | Error::ParameterOutOfBounds { .. }
            | Error::ZeroAmount
            | Error::ZeroAddress
            | Error::DeadlineExceeded { .. }
            | Error::InsufficientBalance { .. }
            | Error::ProtocolPaused
            | Error::BurnAlreadyThisBlock { .. }
            | Error::Config(_) => ErrorCategory::Validation,

            Error::Overflow { .. }
            | Error::Underflow { .. }
            | Error::Reentrancy(_)
            | Error::LockOrderViolation { .. }
            | Error::InvariantViolation(_)
            | Error::Serialization(_)
            | Error::Deserialization(_)
            | Error::Internal(_)
            | Error::Storage(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientReserve { .. }
                | Error::InsufficientLiquidity { .. }
                | Error::SlippageExceeded { .. }
                | Error::StalePrice { .. }
                | Error::NoConsensus
                | Error::DeadlineExceeded { .. }
                | Error::BurnAlreadyThisBlock { .. }
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_)
                | Error::Internal(_)
                | Error::Overflow { .. }
                | Error::Underflow { .. }
                | Error::LockOrderViolation { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Solvency errors: 1xxx
            Error::InsufficientReserve { .. } => 1001,
            Error::CollateralRatioTooLow { .. } => 1002,
            Error::InsufficientLiquidity { .. } => 1003,
            Error::InsufficientNavHoldings { .. } => 1004,

            // Trading errors: 2xxx
            Error::SlippageExceeded { .. } => 2001,
            Error::TradeValueDecreased { .. } => 2002,
            Error::UnsupportedPair(_) => 2003,

            // Oracle errors: 3xxx
            Error::StalePrice { .. } => 3001,
            Error::NoConsensus => 3002,
            Error::PegDeviation { .. } => 3003,
            Error::InvalidConfidence(_) => 3004,
            Error::UnknownReporter(_) => 3005,
            Error::ReporterExists(_) => 3006,
            Error::ReporterLimitReached { .. } => 3007,

            // Authorization errors: 4xxx
            Error::Unauthorized { .. } => 4001,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ParameterOutOfBounds { .. } => 5002,
            Error::ZeroAmount => 5003,
            Error::ZeroAddress => 5004,
            Error::DeadlineExceeded { .. } => 5005,
            Error::InsufficientBalance { .. } => 5006,
            Error::Overflow { .. } => 5007,
            Error::Underflow { .. } => 5008,

            // Protocol errors: 6xxx
            Error::ProtocolPaused => 6001,
            Error::BurnAlreadyThisBlock { .. } => 6002,
            Error::Reentrancy(_) => 6003,
            Error::LockOrderViolation { .. } => 6004,
            Error::InvariantViolation(_) => 6005,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Maintenance errors: 8xxx
            Error::RebalanceFailed(_) => 8001,
            Error::SweepFailed(_) => 8002,

            // Internal errors: 9xxx
            Error::Internal(_) => 9001,
            Error::Storage(_) => 9002,
            Error::Config(_) => 9003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::InsufficientReserve { asset: "KSM".into(), required: 0, available: 0 }.code(),
            Error::CollateralRatioTooLow { current_bps: 0, minimum_bps: 0 }.code(),
            Error::SlippageExceeded { minimum: 0, actual: 0 }.code(),
            Error::StalePrice { age: 0, max_age: 0 }.code(),
            Error::NoConsensus.code(),
            Error::Unauthorized { caller: "".into(), capability: "".into() }.code(),
            Error::ZeroAmount.code(),
            Error::ZeroAddress.code(),
            Error::ProtocolPaused.code(),
            Error::Reentrancy("".into()).code(),
            Error::RebalanceFailed("".into()).code(),
            Error::Internal("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientReserve {
            asset: "DOT".into(),
            required: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("DOT"));
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::ZeroAmount.category(), ErrorCategory::Validation);
        assert_eq!(Error::DeadlineExceeded { deadline: 1, now: 2 }.category(), ErrorCategory::Validation);
        assert_eq!(Error::StalePrice { age: 301, max_age: 300 }.category(), ErrorCategory::Staleness);
        assert_eq!(
            Error::InsufficientLiquidity { required_usd: 1, available_usd: 0 }.category(),
            ErrorCategory::Solvency
        );
        assert_eq!(Error::SweepFailed("x".into()).category(), ErrorCategory::Maintenance);
        assert_eq!(
            Error::Unauthorized { caller: "a".into(), capability: "Admin".into() }.category(),
            ErrorCategory::Authorization
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::StalePrice { age: 0, max_age: 0 }.is_recoverable());
        assert!(!Error::Internal("test".into()).is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("test".into()).is_critical());
        assert!(Error::Overflow { operation: "test".into() }.is_critical());
        assert!(!Error::ZeroAmount.is_critical());
    }
}
