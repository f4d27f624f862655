//! Oracle module for consensus pricing.
//!
//! This module provides the price layer every other component reads:
//! - Reporter submissions and validation (peg band, confidence)
//! - Weighted consensus over fresh reporter records
//! - Bootstrap quorum that ratchets up to the full quorum
//! - Consensus history with TWAP and change tracking
//!
//! ## Usage
//!
//! ```rust
//! use parity::core::OracleConfig;
//! use parity::oracle::{OracleConsensus, PriceSubmission};
//! use parity::utils::Address;
//!
//! let reporter = Address::from_label("reporter-a");
//! let mut oracle = OracleConsensus::new(OracleConfig::default());
//! oracle.add_reporter(reporter, 50).unwrap();
//!
//! let submission = PriceSubmission {
//!     ksm_price: 20_00000000,
//!     dot_price: 5_00000000,
//!     stable_price: 1_00000000,
//!     ksm_market_cap: 150_000_000,
//!     dot_market_cap: 7_500_000_000,
//!     confidence: 90,
//! };
//! oracle.submit_price(&reporter, submission, 1_000).unwrap();
//! assert!(oracle.is_data_fresh(1_000));
//! ```

pub mod consensus;
pub mod price_record;

pub use consensus::*;
pub use price_record::*;
