//! PARITY token ledger.
//!
//! This module implements the synthetic token itself:
//! - Token minting and burning
//! - Balance tracking
//! - Transfer operations
//! - Supply invariant checking

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::crypto::{Address, Hash};
use crate::utils::format::format_units;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed PARITY amount (18 decimals), kept apart from collateral base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create from base units
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole tokens
    pub fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * PARITY_BASE_UNIT)
    }

    /// Get raw base units
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Saturating addition
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} PARITY", format_units(self.0, PARITY_DECIMALS))
    }
}

impl From<u128> for TokenAmount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl From<TokenAmount> for u128 {
    fn from(amount: TokenAmount) -> Self {
        amount.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARITY TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// The PARITY synthetic token ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityToken {
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u32,
    /// Total supply
    total_supply: TokenAmount,
    /// Balances by account
    balances: BTreeMap<Address, TokenAmount>,
}

impl Default for ParityToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ParityToken {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            name: "Parity".to_string(),
            symbol: "PARITY".to_string(),
            decimals: PARITY_DECIMALS,
            total_supply: TokenAmount::ZERO,
            balances: BTreeMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total supply
    pub fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    /// Get balance of an account
    pub fn balance_of(&self, owner: &Address) -> TokenAmount {
        self.balances.get(owner).copied().unwrap_or(TokenAmount::ZERO)
    }

    /// Mint new tokens
    pub fn mint(&mut self, to: Address, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        if to.is_zero() {
            return Err(Error::ZeroAddress);
        }

        let new_supply = self.total_supply.checked_add(amount).ok_or(Error::Overflow {
            operation: "mint total supply".into(),
        })?;
        let new_balance = self.balance_of(&to).checked_add(amount).ok_or(Error::Overflow {
            operation: "mint balance".into(),
        })?;

        self.balances.insert(to, new_balance);
        self.total_supply = new_supply;
        Ok(())
    }

    /// Burn tokens from an account
    pub fn burn(&mut self, from: Address, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }

        let current_balance = self.balance_of(&from);
        if current_balance < amount {
            return Err(Error::InsufficientBalance {
                required: amount.raw(),
                available: current_balance.raw(),
            });
        }

        self.set_balance(from, current_balance.saturating_sub(amount));
        self.total_supply = self.total_supply.saturating_sub(amount);
        Ok(())
    }

    /// Transfer tokens between accounts
    pub fn transfer(&mut self, from: Address, to: Address, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        if to.is_zero() {
            return Err(Error::ZeroAddress);
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance {
                required: amount.raw(),
                available: from_balance.raw(),
            });
        }

        if from == to {
            return Ok(());
        }

        let to_balance = self.balance_of(&to).checked_add(amount).ok_or(Error::Overflow {
            operation: "transfer balance".into(),
        })?;
        self.set_balance(from, from_balance.saturating_sub(amount));
        self.balances.insert(to, to_balance);
        Ok(())
    }

    fn set_balance(&mut self, owner: Address, balance: TokenAmount) {
        if balance.is_zero() {
            self.balances.remove(&owner);
        } else {
            self.balances.insert(owner, balance);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get number of token holders
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Get all balances (for auditing)
    pub fn all_balances(&self) -> &BTreeMap<Address, TokenAmount> {
        &self.balances
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        let sum = self
            .balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(b.raw()));
        sum == Some(self.total_supply.raw())
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Fingerprint of supply and balances
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(&self.total_supply.raw().to_be_bytes());
        for (owner, balance) in &self.balances {
            data.extend_from_slice(owner.as_bytes());
            data.extend_from_slice(&balance.raw().to_be_bytes());
        }
        Hash::sha256(&data)
    }
}
