//! Reserve module.
//!
//! This module contains the collateral reserve and its surplus sweeper:
//! - Reserve ledger with ratio-checked and burn-path withdrawals
//! - Atomic trade settlement for the PMM engine
//! - Deterministic surplus withdrawal to the sink

pub mod ledger;
pub mod surplus;

pub use ledger::*;
pub use surplus::*;
