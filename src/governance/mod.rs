//! Runtime parameter management for PARITY.
//!
//! This module defines the parameters an admin may change while the
//! engine runs:
//! - Hard bounds per parameter
//! - Whole-configuration validation after every change
//! - A record of each change, emitted as a `ParameterChanged` event
//!
//! Authorization happens at the engine boundary; nothing here checks
//! capabilities.

pub mod parameters;

pub use parameters::*;

use serde::{Deserialize, Serialize};

use crate::utils::crypto::Address;

/// A committed parameter change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChange {
    /// Parameter changed
    pub parameter: ProtocolParameter,
    /// Previous value
    pub old_value: u64,
    /// New value
    pub new_value: u64,
    /// Admin that made the change
    pub changed_by: Address,
}
