//! Core modules for the PARITY protocol.
//!
//! This module contains the fundamental building blocks:
//! - Collateral assets and balance sets
//! - PARITY token ledger
//! - External collateral wallets
//! - Configuration and protocol parameters
//! - Authorization policy

pub mod access;
pub mod asset;
pub mod collateral;
pub mod config;
pub mod token;

pub use access::*;
pub use asset::*;
pub use collateral::*;
pub use config::*;
pub use token::*;
