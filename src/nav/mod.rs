//! NAV module.
//!
//! This module contains the NAV side pool:
//! - Contribution intake on mint
//! - Target-mix rebalancing through the PMM engine
//! - Premium and bonus payout planning for burns

pub mod accumulator;

pub use accumulator::*;
