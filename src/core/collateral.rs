//! External collateral token balances.
//!
//! Users hold KSM, DOT and the stable asset outside the protocol. Mints
//! debit these wallets, burns and swaps credit them. Test tooling funds
//! wallets directly with [`CollateralLedger::credit`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::asset::{Asset, AssetBalances};
use crate::error::{Error, Result};
use crate::utils::crypto::Address;

/// Wallet balances of every account, per asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralLedger {
    wallets: BTreeMap<Address, AssetBalances>,
}

impl CollateralLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of one asset
    pub fn balance(&self, owner: &Address, asset: Asset) -> u128 {
        self.wallets.get(owner).map(|b| b.get(asset)).unwrap_or(0)
    }

    /// All balances of an account
    pub fn balances_of(&self, owner: &Address) -> AssetBalances {
        self.wallets.get(owner).copied().unwrap_or_default()
    }

    /// Add to an account
    pub fn credit(&mut self, owner: Address, asset: Asset, amount: u128) -> Result<()> {
        if owner.is_zero() {
            return Err(Error::ZeroAddress);
        }
        if amount == 0 {
            return Ok(());
        }
        self.wallets.entry(owner).or_default().credit(asset, amount)
    }

    /// Remove from an account
    pub fn debit(&mut self, owner: &Address, asset: Asset, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let wallet = self.wallets.get_mut(owner).ok_or(Error::InsufficientBalance {
            required: amount,
            available: 0,
        })?;
        wallet.debit(asset, amount)?;
        if wallet.is_empty() {
            self.wallets.remove(owner);
        }
        Ok(())
    }

    /// Number of funded accounts
    pub fn account_count(&self) -> usize {
        self.wallets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_and_debit() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");

        ledger.credit(alice, Asset::Stable, 500).unwrap();
        ledger.debit(&alice, Asset::Stable, 200).unwrap();
        assert_eq!(ledger.balance(&alice, Asset::Stable), 300);

        let err = ledger.debit(&alice, Asset::Ksm, 1).unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { required: 1, available: 0 }));
    }

    #[test]
    fn test_empty_wallets_are_pruned() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");
        ledger.credit(alice, Asset::Dot, 10).unwrap();
        ledger.debit(&alice, Asset::Dot, 10).unwrap();
        assert_eq!(ledger.account_count(), 0);
        assert!(ledger.balances_of(&alice).is_empty());
    }

    #[test]
    fn test_zero_address_rejected() {
        let mut ledger = CollateralLedger::new();
        assert_eq!(ledger.credit(Address::ZERO, Asset::Dot, 1), Err(Error::ZeroAddress));
    }
}
