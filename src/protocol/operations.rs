//! Protocol operations - atomic state changes.
//!
//! Operations represent discrete user actions the engine executes
//! atomically. Each operation names its caller and deadline; the engine
//! validates, applies, and emits events for it, or leaves state untouched.

use serde::{Deserialize, Serialize};
use std::result::Result as StdResult;

use crate::core::asset::{Asset, AssetBalances};
use crate::nav::RebalanceOutcome;
use crate::oracle::PriceSubmission;
use crate::reserve::SweepOutcome;
use crate::trading::PmmQuote;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATION TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Trait for protocol operations
pub trait Operation {
    /// The result type of this operation
    type Result;

    /// Get the operation type name
    fn operation_type(&self) -> &'static str;

    /// Account executing the operation
    fn caller(&self) -> &Address;

    /// Latest timestamp at which the operation may execute
    fn deadline(&self) -> u64;
}

macro_rules! impl_operation {
    ($op:ty, $result:ty, $name:literal, $caller:ident) => {
        impl Operation for $op {
            type Result = $result;

            fn operation_type(&self) -> &'static str {
                $name
            }

            fn caller(&self) -> &Address {
                &self.$caller
            }

            fn deadline(&self) -> u64 {
                self.deadline
            }
        }
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// MINT / BURN
// ═══════════════════════════════════════════════════════════════════════════════

/// Deposit collateral and mint PARITY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintOp {
    /// Depositor and recipient
    pub user: Address,
    /// Deposited asset
    pub asset: Asset,
    /// Deposited amount
    pub amount: u128,
    /// Minimum PARITY out; zero selects the default floor
    #[serde(default)]
    pub min_parity_out: u128,
    /// Latest execution time
    pub deadline: u64,
}

impl_operation!(MintOp, MintResult, "Mint", user);

/// Result of a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintResult {
    /// PARITY credited to the user
    pub parity_minted: u128,
    /// PARITY credited to the surplus sink
    pub fee_parity: u128,
    /// Collateral routed to the NAV pool
    pub nav_amount: u128,
    /// Collateral deposited in the reserve
    pub reserve_amount: u128,
    /// USD value of the deposit
    pub collateral_usd: u128,
    /// PARITY price used
    pub parity_price: u64,
}

/// Burn PARITY for one collateral asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnOp {
    /// Burner and recipient
    pub user: Address,
    /// PARITY presented, fee included
    pub parity_amount: u128,
    /// Asset to receive from the reserve
    pub asset_out: Asset,
    /// Minimum reserve payout; zero selects the default floor
    #[serde(default)]
    pub min_amount_out: u128,
    /// Latest execution time
    pub deadline: u64,
}

impl_operation!(BurnOp, BurnResult, "Burn", user);

/// Burn PARITY for a liquidity-weighted mix of collateral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiBurnOp {
    /// Burner and recipient
    pub user: Address,
    /// PARITY presented, fee included
    pub parity_amount: u128,
    /// Per-asset minimum reserve payout; zero entries select the default floor
    #[serde(default)]
    pub min_amounts_out: AssetBalances,
    /// Latest execution time
    pub deadline: u64,
}

impl_operation!(MultiBurnOp, BurnResult, "MultiBurn", user);

/// Result of a burn or multi-burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnResult {
    /// PARITY presented
    pub parity_amount: u128,
    /// PARITY moved to the surplus sink
    pub fee_parity: u128,
    /// PARITY destroyed
    pub parity_burned: u128,
    /// USD value of the destroyed PARITY
    pub base_usd: u128,
    /// Signed policy adjustment (positive: contribution, negative: premium)
    pub policy_bps: i64,
    /// Collateral paid from the reserve
    pub reserve_payout: AssetBalances,
    /// Collateral routed from the reserve to the NAV pool
    pub nav_contribution: AssetBalances,
    /// Collateral paid from the NAV pool (premium or bonus)
    pub nav_payout: AssetBalances,
    /// Everything the user received
    pub total_payout: AssetBalances,
    /// The whole supply was burned
    pub final_burn: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SWAP / TRANSFER
// ═══════════════════════════════════════════════════════════════════════════════

/// Swap collateral against the reserve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOp {
    /// Trader
    pub user: Address,
    /// Asset paid
    pub asset_in: Asset,
    /// Amount paid
    pub amount_in: u128,
    /// Asset wanted
    pub asset_out: Asset,
    /// Minimum output; zero selects the default floor
    #[serde(default)]
    pub min_amount_out: u128,
    /// Latest execution time
    pub deadline: u64,
}

impl_operation!(SwapOp, SwapResult, "Swap", user);

/// Result of a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    /// Settled quote
    pub quote: PmmQuote,
    /// Minimum output enforced
    pub min_output: u128,
    /// Slippage was zero or at the cap
    pub anomalous: bool,
}

/// Transfer PARITY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOp {
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Amount
    pub amount: u128,
    /// Latest execution time
    pub deadline: u64,
}

impl_operation!(TransferOp, TransferResult, "Transfer", from);

/// Result of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Sender balance after the transfer
    pub from_balance: u128,
    /// Recipient balance after the transfer
    pub to_balance: u128,
}

/// Submit a reporter price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPriceOp {
    /// Reporter
    pub reporter: Address,
    /// Reported market view
    pub submission: PriceSubmission,
    /// Latest execution time
    pub deadline: u64,
}

impl_operation!(SubmitPriceOp, SubmitPriceResult, "SubmitPrice", reporter);

/// Result of a price submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPriceResult {
    /// Consensus was recomputed
    pub consensus_updated: bool,
    /// Reporters with fresh records
    pub live_reporters: usize,
    /// Quorum in force
    pub quorum: usize,
    /// This submission ended bootstrap mode
    pub bootstrap_completed: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAINTENANCE
// ═══════════════════════════════════════════════════════════════════════════════

/// What one maintenance run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Rebalance outcome, or the error that was swallowed
    pub rebalance: StdResult<RebalanceOutcome, String>,
    /// Sweep outcome, or the error that was swallowed
    pub sweep: StdResult<SweepOutcome, String>,
}

impl MaintenanceReport {
    /// Whether a rebalance or sweep actually changed state
    pub fn changed_state(&self) -> bool {
        matches!(self.rebalance, Ok(RebalanceOutcome::Rebalanced { .. }))
            || matches!(self.sweep, Ok(SweepOutcome::Swept { .. }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Any user operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolOperation {
    /// Mint PARITY
    Mint(MintOp),
    /// Burn for one asset
    Burn(BurnOp),
    /// Burn for a liquidity-weighted mix
    MultiBurn(MultiBurnOp),
    /// Swap against the reserve
    Swap(SwapOp),
    /// Transfer PARITY
    Transfer(TransferOp),
    /// Submit a reporter price
    SubmitPrice(SubmitPriceOp),
}

impl ProtocolOperation {
    /// Get the operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Mint(op) => op.operation_type(),
            Self::Burn(op) => op.operation_type(),
            Self::MultiBurn(op) => op.operation_type(),
            Self::Swap(op) => op.operation_type(),
            Self::Transfer(op) => op.operation_type(),
            Self::SubmitPrice(op) => op.operation_type(),
        }
    }

    /// Account executing the operation
    pub fn caller(&self) -> &Address {
        match self {
            Self::Mint(op) => op.caller(),
            Self::Burn(op) => op.caller(),
            Self::MultiBurn(op) => op.caller(),
            Self::Swap(op) => op.caller(),
            Self::Transfer(op) => op.caller(),
            Self::SubmitPrice(op) => op.caller(),
        }
    }
}

/// Result of any user operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    /// Mint result
    Mint(MintResult),
    /// Burn or multi-burn result
    Burn(BurnResult),
    /// Swap result
    Swap(SwapResult),
    /// Transfer result
    Transfer(TransferResult),
    /// Price submission result
    SubmitPrice(SubmitPriceResult),
}
