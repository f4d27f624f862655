//! Component locks with a fixed acquisition order.
//!
//! Each engine component (Core, NAV, PMM, Reserve) has a non-reentrant
//! lock. Locks must be taken in rank order Core → NAV → PMM → Reserve:
//! - Taking a lock that is already held is [`Error::Reentrancy`]
//! - Taking a lock ranked at or below a held one is [`Error::LockOrderViolation`]
//!
//! Guards are RAII and release their lock on drop, on every exit path.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// A lockable engine component, in acquisition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// Mint/burn orchestrator
    Core = 0,
    /// NAV accumulator
    Nav = 1,
    /// PMM trading engine
    Pmm = 2,
    /// Reserve ledger
    Reserve = 3,
}

impl Component {
    /// Every component, in rank order
    pub const ALL: [Component; 4] = [Component::Core, Component::Nav, Component::Pmm, Component::Reserve];

    /// Acquisition rank
    pub fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Core => "core",
            Component::Nav => "nav",
            Component::Pmm => "pmm",
            Component::Reserve => "reserve",
        };
        write!(f, "{}", name)
    }
}

/// Shared lock table; clones refer to the same locks
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    held: Arc<[AtomicBool; 4]>,
}

impl LockTable {
    /// All locks free
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock of `component`
    pub fn acquire(&self, component: Component) -> Result<LockGuard> {
        if self.is_held(component) {
            return Err(Error::Reentrancy(component.to_string()));
        }
        if let Some(held) = Component::ALL
            .iter()
            .rev()
            .find(|c| c.rank() > component.rank() && self.is_held(**c))
        {
            return Err(Error::LockOrderViolation {
                held: held.to_string(),
                requested: component.to_string(),
            });
        }
        self.held[component.rank()]
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::Reentrancy(component.to_string()))?;
        Ok(LockGuard {
            table: self.clone(),
            component,
        })
    }

    /// Whether `component` is locked
    pub fn is_held(&self, component: Component) -> bool {
        self.held[component.rank()].load(Ordering::SeqCst)
    }

    /// Components currently locked
    pub fn held(&self) -> Vec<Component> {
        Component::ALL.into_iter().filter(|c| self.is_held(*c)).collect()
    }
}

/// Held lock, released on drop
#[derive(Debug)]
pub struct LockGuard {
    table: LockTable,
    component: Component,
}

impl LockGuard {
    /// Locked component
    pub fn component(&self) -> Component {
        self.component
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.table.held[self.component.rank()].store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_acquisition() {
        let locks = LockTable::new();
        let core = locks.acquire(Component::Core).unwrap();
        let nav = locks.acquire(Component::Nav).unwrap();
        let pmm = locks.acquire(Component::Pmm).unwrap();
        let reserve = locks.acquire(Component::Reserve).unwrap();
        assert_eq!(locks.held().len(), 4);
        drop((reserve, pmm, nav, core));
        assert!(locks.held().is_empty());
    }

    #[test]
    fn test_skipping_ranks_is_allowed() {
        let locks = LockTable::new();
        let _core = locks.acquire(Component::Core).unwrap();
        let _reserve = locks.acquire(Component::Reserve).unwrap();
        assert!(locks.is_held(Component::Reserve));
    }

    #[test]
    fn test_reentrancy_rejected() {
        let locks = LockTable::new();
        let _pmm = locks.acquire(Component::Pmm).unwrap();
        assert_eq!(
            locks.acquire(Component::Pmm).unwrap_err(),
            Error::Reentrancy("pmm".into())
        );
    }

    #[test]
    fn test_inversion_rejected() {
        let locks = LockTable::new();
        let _reserve = locks.acquire(Component::Reserve).unwrap();
        assert_eq!(
            locks.acquire(Component::Nav).unwrap_err(),
            Error::LockOrderViolation {
                held: "reserve".into(),
                requested: "nav".into(),
            }
        );
    }

    #[test]
    fn test_released_on_early_return() {
        fn failing(locks: &LockTable) -> Result<()> {
            let _guard = locks.acquire(Component::Core)?;
            Err(Error::ZeroAmount)
        }
        let locks = LockTable::new();
        assert!(failing(&locks).is_err());
        assert!(!locks.is_held(Component::Core));
    }

    #[test]
    fn test_clones_share_state() {
        let locks = LockTable::new();
        let other = locks.clone();
        let _core = locks.acquire(Component::Core).unwrap();
        assert!(other.is_held(Component::Core));
    }
}
