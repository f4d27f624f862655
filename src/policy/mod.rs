//! Burn policy module.
//!
//! This module decides how each burn shares value with the NAV pool:
//! - Per-user activity baselines (weighted supply at mint time)
//! - Growth-ratio driven contribution or premium

pub mod baseline;
pub mod burn_policy;

pub use baseline::*;
pub use burn_policy::{evaluate as evaluate_burn_policy, PolicyAdjustment, PolicyDecision, PolicyInput};
