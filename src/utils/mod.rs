//! Utility modules for the PARITY protocol.
//!
//! This module contains shared utilities used across the protocol:
//! - Identity and hashing primitives
//! - Fixed-point arithmetic and USD normalization
//! - Validation helpers
//! - Amount formatting
//! - Constants

pub mod constants;
pub mod crypto;
pub mod format;
pub mod math;
pub mod validation;

pub use constants::*;
pub use crypto::*;
pub use math::*;
pub use validation::*;
