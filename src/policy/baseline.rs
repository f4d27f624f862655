//! Activity baseline tracker.
//!
//! Every user carries a weighted average of the total supply observed at
//! their mints:
//!
//! ```text
//! numerator   = Σ amount * supply_at_mint / 1e18
//! denominator = Σ amount
//! baseline    = numerator * 1e18 / denominator
//! ```
//!
//! Transfers move a proportional slice of the sender's weight to the
//! receiver. Burns shrink the weight proportionally. Neither side can
//! underflow.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::utils::constants::WAD;
use crate::utils::crypto::Address;
use crate::utils::math::{mul_div, safe_add};

/// Weighted baseline of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserBaseline {
    /// Σ amount × supply (scaled down by 1e18)
    pub numerator: u128,
    /// Σ amount
    pub denominator: u128,
}

impl UserBaseline {
    /// Average supply at mint time (18 decimals), zero without weight
    pub fn average(&self) -> Result<u128> {
        if self.denominator == 0 {
            return Ok(0);
        }
        mul_div(self.numerator, WAD, self.denominator)
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.numerator == 0 && self.denominator == 0
    }

    /// Remove `amount` of weight at the current average; returns the numerator removed
    fn shrink(&mut self, amount: u128) -> Result<(u128, u128)> {
        if self.denominator == 0 {
            return Ok((0, 0));
        }
        let removed = amount.min(self.denominator);
        let numerator = mul_div(self.numerator, removed, self.denominator)?.min(self.numerator);
        self.numerator -= numerator;
        self.denominator -= removed;
        Ok((numerator, removed))
    }
}

/// Per-user baseline ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineTracker {
    baselines: BTreeMap<Address, UserBaseline>,
}

impl BaselineTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline of a user (empty if never seen)
    pub fn get(&self, user: &Address) -> UserBaseline {
        self.baselines.get(user).copied().unwrap_or_default()
    }

    /// Average baseline supply of a user
    pub fn average(&self, user: &Address) -> Result<u128> {
        self.get(user).average()
    }

    /// Tracked users
    pub fn user_count(&self) -> usize {
        self.baselines.len()
    }

    /// Record a mint of `amount` observed at `supply`
    pub fn record_mint(&mut self, user: Address, amount: u128, supply: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let weight = mul_div(amount, supply, WAD)?;
        let entry = self.baselines.entry(user).or_default();
        entry.numerator = safe_add(entry.numerator, weight)?;
        entry.denominator = safe_add(entry.denominator, amount)?;
        Ok(())
    }

    /// Record a transfer; the part the sender has no weight for only adds
    /// to the receiver's denominator
    pub fn record_transfer(&mut self, from: &Address, to: Address, amount: u128) -> Result<()> {
        if amount == 0 || *from == to {
            return Ok(());
        }
        let (numerator, moved) = match self.baselines.get_mut(from) {
            Some(sender) => sender.shrink(amount)?,
            None => (0, 0),
        };
        let entry = self.baselines.entry(to).or_default();
        entry.numerator = safe_add(entry.numerator, numerator)?;
        entry.denominator = safe_add(entry.denominator, moved)?;
        entry.denominator = safe_add(entry.denominator, amount - moved)?;
        Ok(())
    }

    /// Record a burn of `amount`, floored at zero
    pub fn record_burn(&mut self, user: &Address, amount: u128) -> Result<()> {
        if let Some(entry) = self.baselines.get_mut(user) {
            entry.shrink(amount)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn test_weighted_average_of_mints() {
        let mut tracker = BaselineTracker::new();
        let alice = user("alice");
        tracker.record_mint(alice, 100 * WAD, 1_000 * WAD).unwrap();
        tracker.record_mint(alice, 300 * WAD, 3_000 * WAD).unwrap();
        // (100*1000 + 300*3000) / 400 = 2500
        assert_eq!(tracker.average(&alice).unwrap(), 2_500 * WAD);
        assert_eq!(tracker.get(&alice).denominator, 400 * WAD);
    }

    #[test]
    fn test_transfer_moves_proportional_slice() {
        let mut tracker = BaselineTracker::new();
        let (alice, bob) = (user("alice"), user("bob"));
        tracker.record_mint(alice, 100 * WAD, 1_000 * WAD).unwrap();

        tracker.record_transfer(&alice, bob, 40 * WAD).unwrap();
        assert_eq!(tracker.get(&alice).denominator, 60 * WAD);
        assert_eq!(tracker.average(&alice).unwrap(), 1_000 * WAD);
        assert_eq!(tracker.get(&bob).denominator, 40 * WAD);
        assert_eq!(tracker.average(&bob).unwrap(), 1_000 * WAD);
    }

    #[test]
    fn test_transfer_without_sender_baseline() {
        let mut tracker = BaselineTracker::new();
        let (carol, dave) = (user("carol"), user("dave"));
        tracker.record_transfer(&carol, dave, 10 * WAD).unwrap();
        let baseline = tracker.get(&dave);
        assert_eq!(baseline.denominator, 10 * WAD);
        assert_eq!(baseline.numerator, 0);
        assert_eq!(tracker.average(&dave).unwrap(), 0);
    }

    #[test]
    fn test_transfer_beyond_sender_weight() {
        let mut tracker = BaselineTracker::new();
        let (alice, bob) = (user("alice"), user("bob"));
        tracker.record_mint(alice, 10 * WAD, 100 * WAD).unwrap();
        tracker.record_transfer(&alice, bob, 15 * WAD).unwrap();
        assert!(tracker.get(&alice).is_empty());
        assert_eq!(tracker.get(&bob).denominator, 15 * WAD);
        assert_eq!(tracker.get(&bob).numerator, 10 * 100 * WAD);
    }

    #[test]
    fn test_burn_floors_at_zero() {
        let mut tracker = BaselineTracker::new();
        let alice = user("alice");
        tracker.record_mint(alice, 10 * WAD, 100 * WAD).unwrap();
        tracker.record_burn(&alice, 4 * WAD).unwrap();
        assert_eq!(tracker.get(&alice).denominator, 6 * WAD);
        assert_eq!(tracker.average(&alice).unwrap(), 100 * WAD);

        tracker.record_burn(&alice, 1_000 * WAD).unwrap();
        assert!(tracker.get(&alice).is_empty());
        tracker.record_burn(&user("nobody"), WAD).unwrap();
        assert_eq!(tracker.user_count(), 1);
    }
}
