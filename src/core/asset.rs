//! Collateral assets and per-asset balance sets.
//!
//! The protocol accepts three collateral assets. Every balance sheet in
//! the system (reserve, NAV pool, user wallets) is an [`AssetBalances`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::constants::{DOT_DECIMALS, KSM_DECIMALS, STABLE_DECIMALS};
use crate::utils::math::{amount_from_usd, safe_add, usd_value};

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET
// ═══════════════════════════════════════════════════════════════════════════════

/// A supported collateral asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    /// Kusama
    Ksm,
    /// Polkadot
    Dot,
    /// USD pegged stable asset
    Stable,
}

impl Asset {
    /// Every asset, in canonical order
    pub const ALL: [Asset; 3] = [Asset::Ksm, Asset::Dot, Asset::Stable];

    /// Ticker symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Ksm => "KSM",
            Asset::Dot => "DOT",
            Asset::Stable => "STABLE",
        }
    }

    /// Native decimal count
    pub fn decimals(&self) -> u32 {
        match self {
            Asset::Ksm => KSM_DECIMALS,
            Asset::Dot => DOT_DECIMALS,
            Asset::Stable => STABLE_DECIMALS,
        }
    }

    /// One whole token in base units
    pub fn unit(&self) -> u128 {
        10u128.pow(self.decimals())
    }

    /// USD value (18 decimals) of `amount` at `price` (8 decimals)
    pub fn usd_value(&self, amount: u128, price: u64) -> Result<u128> {
        usd_value(amount, price, self.decimals())
    }

    /// Base units worth `usd` at `price`
    pub fn amount_for_usd(&self, usd: u128, price: u64) -> Result<u128> {
        amount_from_usd(usd, price, self.decimals())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for Asset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ksm" => Ok(Asset::Ksm),
            "dot" => Ok(Asset::Dot),
            "stable" | "usd" | "usdt" | "usdc" => Ok(Asset::Stable),
            _ => Err(Error::InvalidParameter {
                name: "asset".into(),
                reason: format!("unknown asset {}", s),
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET PRICES
// ═══════════════════════════════════════════════════════════════════════════════

/// One price per asset, 8 decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetPrices {
    /// KSM price
    pub ksm: u64,
    /// DOT price
    pub dot: u64,
    /// Stable asset price
    pub stable: u64,
}

impl AssetPrices {
    /// Price of one asset
    pub fn get(&self, asset: Asset) -> u64 {
        match asset {
            Asset::Ksm => self.ksm,
            Asset::Dot => self.dot,
            Asset::Stable => self.stable,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET BALANCES
// ═══════════════════════════════════════════════════════════════════════════════

/// One balance per asset, in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetBalances {
    /// KSM balance
    pub ksm: u128,
    /// DOT balance
    pub dot: u128,
    /// Stable asset balance
    pub stable: u128,
}

impl AssetBalances {
    /// Empty balance set
    pub const ZERO: Self = Self { ksm: 0, dot: 0, stable: 0 };

    /// Balance set holding a single asset
    pub fn single(asset: Asset, amount: u128) -> Self {
        let mut balances = Self::ZERO;
        balances.set(asset, amount);
        balances
    }

    /// Balance of one asset
    pub fn get(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Ksm => self.ksm,
            Asset::Dot => self.dot,
            Asset::Stable => self.stable,
        }
    }

    /// Overwrite the balance of one asset
    pub fn set(&mut self, asset: Asset, amount: u128) {
        match asset {
            Asset::Ksm => self.ksm = amount,
            Asset::Dot => self.dot = amount,
            Asset::Stable => self.stable = amount,
        }
    }

    /// Add to one asset
    pub fn credit(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let updated = safe_add(self.get(asset), amount)?;
        self.set(asset, updated);
        Ok(())
    }

    /// Subtract from one asset, failing if the balance is too small
    pub fn debit(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let available = self.get(asset);
        if available < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.set(asset, available - amount);
        Ok(())
    }

    /// Add every asset of `other`
    pub fn credit_all(&mut self, other: &AssetBalances) -> Result<()> {
        for asset in Asset::ALL {
            self.credit(asset, other.get(asset))?;
        }
        Ok(())
    }

    /// True when every asset is zero
    pub fn is_empty(&self) -> bool {
        self.ksm == 0 && self.dot == 0 && self.stable == 0
    }

    /// Iterate `(asset, balance)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Asset, u128)> + '_ {
        Asset::ALL.into_iter().map(move |asset| (asset, self.get(asset)))
    }

    /// USD value of each asset at `prices`
    pub fn usd_values(&self, prices: &AssetPrices) -> Result<AssetBalances> {
        let mut values = AssetBalances::ZERO;
        for asset in Asset::ALL {
            values.set(asset, asset.usd_value(self.get(asset), prices.get(asset))?);
        }
        Ok(values)
    }

    /// Total USD value at `prices`
    pub fn total_usd(&self, prices: &AssetPrices) -> Result<u128> {
        let values = self.usd_values(prices)?;
        safe_add(safe_add(values.ksm, values.dot)?, values.stable)
    }

    /// Sum of the raw entries (meaningful only for USD valued sets)
    pub fn sum(&self) -> Result<u128> {
        safe_add(safe_add(self.ksm, self.dot)?, self.stable)
    }
}
