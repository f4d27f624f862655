//! Trading module.
//!
//! This module provides the PMM engine that trades against the reserve:
//! - Utilization-based quadratic slippage curve
//! - Oracle-priced quotes with flat fee
//! - Two-phase escrowed settlement with slippage floors

pub mod pmm;
pub mod slippage;

pub use pmm::*;
pub use slippage::*;
