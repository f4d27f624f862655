//! Authorization policy for privileged entry points.
//!
//! The engine never consults role storage directly. It receives an
//! [`AuthorizationPolicy`] at construction and asks it whether a caller
//! holds a [`Capability`] before running any privileged operation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::crypto::Address;

/// A privilege required by an engine entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Parameter updates, role and reporter management
    Admin,
    /// Pause and unpause
    Pauser,
    /// Run maintenance (rebalance, sweep)
    Keeper,
    /// Deposit protocol-owned liquidity into the reserve
    ReserveManager,
}

impl Capability {
    /// Every capability
    pub const ALL: [Capability; 4] = [
        Capability::Admin,
        Capability::Pauser,
        Capability::Keeper,
        Capability::ReserveManager,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Admin => "Admin",
            Capability::Pauser => "Pauser",
            Capability::Keeper => "Keeper",
            Capability::ReserveManager => "ReserveManager",
        };
        write!(f, "{}", name)
    }
}

/// Decides whether a caller may use a capability
pub trait AuthorizationPolicy {
    /// Returns true if `caller` holds `capability`
    fn is_authorized(&self, caller: &Address, capability: Capability) -> bool;

    /// Fails with [`Error::Unauthorized`] unless `caller` holds `capability`
    fn authorize(&self, caller: &Address, capability: Capability) -> Result<()> {
        if self.is_authorized(caller, capability) {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                caller: caller.to_hex(),
                capability: capability.to_string(),
            })
        }
    }

    /// Grant a capability, where the policy supports mutation
    fn grant(&mut self, _account: Address, _capability: Capability) -> Result<()> {
        Err(Error::InvalidParameter {
            name: "policy".into(),
            reason: "authorization policy is immutable".into(),
        })
    }

    /// Revoke a capability, where the policy supports mutation
    fn revoke(&mut self, _account: &Address, _capability: Capability) -> Result<()> {
        Err(Error::InvalidParameter {
            name: "policy".into(),
            reason: "authorization policy is immutable".into(),
        })
    }
}

/// Capability table keyed by account; admins implicitly hold every capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    roles: BTreeMap<Address, BTreeSet<Capability>>,
}

impl RoleRegistry {
    /// Registry with a single admin
    pub fn with_admin(admin: Address) -> Self {
        let mut registry = Self::default();
        registry.roles.entry(admin).or_default().insert(Capability::Admin);
        registry
    }

    /// Capabilities explicitly granted to an account
    pub fn capabilities_of(&self, account: &Address) -> Vec<Capability> {
        self.roles
            .get(account)
            .map(|caps| caps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of accounts holding at least one capability
    pub fn member_count(&self) -> usize {
        self.roles.len()
    }
}

impl AuthorizationPolicy for RoleRegistry {
    fn is_authorized(&self, caller: &Address, capability: Capability) -> bool {
        self.roles
            .get(caller)
            .map(|caps| caps.contains(&capability) || caps.contains(&Capability::Admin))
            .unwrap_or(false)
    }

    fn grant(&mut self, account: Address, capability: Capability) -> Result<()> {
        if account.is_zero() {
            return Err(Error::ZeroAddress);
        }
        self.roles.entry(account).or_default().insert(capability);
        Ok(())
    }

    fn revoke(&mut self, account: &Address, capability: Capability) -> Result<()> {
        if let Some(caps) = self.roles.get_mut(account) {
            caps.remove(&capability);
            if caps.is_empty() {
                self.roles.remove(account);
            }
        }
        Ok(())
    }
}

/// Policy that authorizes every caller, for simulations
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationPolicy for AllowAll {
    fn is_authorized(&self, _caller: &Address, _capability: Capability) -> bool {
        true
    }
}
