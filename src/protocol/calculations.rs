//! Pure mint and burn calculations.
//!
//! Every function here takes an explicit parameter struct and returns a
//! result struct. Nothing reads or writes engine state.

use serde::{Deserialize, Serialize};

use crate::core::asset::{Asset, AssetBalances, AssetPrices};
use crate::error::{Error, Result};
use crate::nav::NavPayoutMode;
use crate::policy::{PolicyAdjustment, PolicyDecision};
use crate::utils::constants::PARITY_DECIMALS;
use crate::utils::math::{amount_after_fee, amount_from_usd, bps_of, mul_div, safe_sub, usd_value};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// MINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Inputs of a mint calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    /// Deposited asset
    pub asset: Asset,
    /// Deposited amount
    pub amount: u128,
    /// Consensus price of the deposited asset
    pub asset_price: u64,
    /// PARITY reference price
    pub parity_price: u64,
    /// Share of the deposit routed to the NAV pool
    pub nav_contribution_bps: u64,
    /// Mint fee
    pub mint_fee_bps: u64,
}

/// Outcome of a mint calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintCalculation {
    /// Collateral routed to the NAV pool
    pub nav_amount: u128,
    /// Collateral deposited in the reserve
    pub reserve_amount: u128,
    /// USD value of the whole deposit
    pub collateral_usd: u128,
    /// PARITY worth the deposit
    pub gross_parity: u128,
    /// PARITY minted to the surplus sink
    pub fee_parity: u128,
    /// PARITY minted to the user
    pub net_parity: u128,
}

/// Split a deposit and price it in PARITY
pub fn calculate_mint(params: &MintParams) -> Result<MintCalculation> {
    validate_non_zero(params.amount)?;

    let nav_amount = bps_of(params.amount, params.nav_contribution_bps)?;
    let reserve_amount = safe_sub(params.amount, nav_amount)?;

    let collateral_usd = params.asset.usd_value(params.amount, params.asset_price)?;
    let gross_parity = amount_from_usd(collateral_usd, params.parity_price, PARITY_DECIMALS)?;
    let fee_parity = bps_of(gross_parity, params.mint_fee_bps)?;
    let net_parity = safe_sub(gross_parity, fee_parity)?;
    if net_parity == 0 {
        return Err(Error::InvalidParameter {
            name: "amount".into(),
            reason: "deposit is worth less than one PARITY base unit".into(),
        });
    }

    Ok(MintCalculation {
        nav_amount,
        reserve_amount,
        collateral_usd,
        gross_parity,
        fee_parity,
        net_parity,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// BURN
// ═══════════════════════════════════════════════════════════════════════════════

/// Inputs of a burn calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnParams {
    /// PARITY presented for burning, fee included
    pub parity_amount: u128,
    /// Total supply before the burn
    pub total_supply: u128,
    /// PARITY reference price
    pub parity_price: u64,
    /// Burn fee, charged in PARITY
    pub burn_fee_bps: u64,
    /// Policy decision for this burn
    pub policy: PolicyDecision,
    /// How the NAV pool pays out
    pub payout_mode: NavPayoutMode,
    /// NAV pool value
    pub nav_value_usd: u128,
    /// Reserve value the payout route can draw from
    pub reserve_liquidity_usd: u128,
}

/// Outcome of a burn calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnCalculation {
    /// PARITY moved to the surplus sink
    pub fee_parity: u128,
    /// PARITY destroyed
    pub net_parity: u128,
    /// USD value of the destroyed PARITY
    pub base_usd: u128,
    /// Signed policy bps that applied (zero when the policy was not used)
    pub policy_bps: i64,
    /// Redemption value routed from the reserve to the NAV pool
    pub contribution_usd: u128,
    /// Premium owed from the NAV pool
    pub premium_usd: u128,
    /// Redemption value paid to the user from the reserve; a final burn
    /// takes at most what the reserve holds
    pub user_usd: u128,
    /// The whole supply is being burned
    pub final_burn: bool,
}

/// Split a burn into fee, reserve payout, contribution and premium
pub fn calculate_burn(params: &BurnParams) -> Result<BurnCalculation> {
    validate_non_zero(params.parity_amount)?;

    let fee_parity = bps_of(params.parity_amount, params.burn_fee_bps)?;
    let net_parity = safe_sub(params.parity_amount, fee_parity)?;
    validate_non_zero(net_parity)?;
    let base_usd = usd_value(net_parity, params.parity_price, PARITY_DECIMALS)?;

    let final_burn = params.parity_amount == params.total_supply;
    let (policy_bps, contribution_usd, premium_usd) = if final_burn {
        (0, 0, params.nav_value_usd)
    } else {
        match params.payout_mode {
            NavPayoutMode::ProportionalBonus => (0, 0, 0),
            NavPayoutMode::PolicyPremium => match params.policy.adjustment {
                PolicyAdjustment::Contribution(bps) => {
                    (params.policy.signed_bps(), bps_of(base_usd, bps)?, 0)
                }
                PolicyAdjustment::Premium(bps) => (
                    params.policy.signed_bps(),
                    0,
                    bps_of(base_usd, bps)?.min(params.nav_value_usd),
                ),
            },
        }
    };

    let user_usd = if final_burn {
        base_usd.min(params.reserve_liquidity_usd)
    } else {
        safe_sub(base_usd, contribution_usd)?
    };

    Ok(BurnCalculation {
        fee_parity,
        net_parity,
        base_usd,
        policy_bps,
        contribution_usd,
        premium_usd,
        user_usd,
        final_burn,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// ALLOCATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Split `usd` across assets in proportion to their USD liquidity.
///
/// Each share is floor-rounded, so the parts may sum to slightly less
/// than `usd`.
pub fn allocate_by_liquidity(usd: u128, liquidity_usd: &AssetBalances) -> Result<AssetBalances> {
    let available = liquidity_usd.sum()?;
    if available < usd {
        return Err(Error::InsufficientLiquidity {
            required_usd: usd,
            available_usd: available,
        });
    }
    let mut shares = AssetBalances::ZERO;
    if usd == 0 {
        return Ok(shares);
    }
    for (asset, liquidity) in liquidity_usd.iter() {
        shares.set(asset, mul_div(usd, liquidity, available)?);
    }
    Ok(shares)
}

/// Convert per-asset USD values into asset amounts
pub fn usd_to_amounts(usd: &AssetBalances, prices: &AssetPrices) -> Result<AssetBalances> {
    let mut amounts = AssetBalances::ZERO;
    for (asset, value) in usd.iter() {
        if value > 0 {
            amounts.set(asset, asset.amount_for_usd(value, prices.get(asset))?);
        }
    }
    Ok(amounts)
}

/// Minimum output to enforce: the caller's, or the quote minus the default floor.
///
/// Burn payouts carry no slippage, so the default floor only matters when a
/// caller supplies their own minimum.
pub fn slippage_floor(expected: u128, min_out: u128, default_floor_bps: u64) -> Result<u128> {
    if min_out > 0 {
        Ok(min_out)
    } else {
        amount_after_fee(expected, default_floor_bps)
    }
}

/// Fail unless `actual` reaches the minimum
pub fn check_min_output(actual: u128, minimum: u128) -> Result<()> {
    if actual < minimum {
        return Err(Error::SlippageExceeded { minimum, actual });
    }
    Ok(())
}
