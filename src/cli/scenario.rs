//! Scripted scenarios.
//!
//! A scenario is a JSON document listing steps to run against a
//! [`ProtocolEngine`]. Accounts are written as labels (hashed into
//! addresses) or 64-digit hex addresses, and amounts as decimal strings in
//! whole tokens, so scenarios read the way an operator thinks about them:
//!
//! ```json
//! {
//!   "name": "first mint",
//!   "admin": "admin",
//!   "steps": [
//!     { "block": { "height": 1, "timestamp": 1000 } },
//!     { "add_reporter": { "reporter": "r1", "weight": 10 } },
//!     { "submit_price": { "reporter": "r1", "ksm_price": "20", "dot_price": "5",
//!                         "ksm_market_cap": 150000000, "dot_market_cap": 7500000000 } },
//!     { "credit": { "account": "alice", "asset": "stable", "amount": "1000" } },
//!     { "mint": { "user": "alice", "asset": "stable", "amount": "1000" } },
//!     { "expect_failure": { "burn": { "user": "bob", "parity": "1", "asset_out": "stable" } } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::core::access::{AuthorizationPolicy, Capability, RoleRegistry};
use crate::core::asset::{Asset, AssetBalances};
use crate::core::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::governance::ProtocolParameter;
use crate::nav::NavPayoutMode;
use crate::oracle::PriceSubmission;
use crate::protocol::*;
use crate::utils::constants::{PARITY_DECIMALS, PRICE_DECIMALS};
use crate::utils::crypto::Address;
use crate::utils::format::parse_units;

/// Resolve an account written as a label or a hex address
pub fn resolve_account(account: &str) -> Result<Address> {
    let account = account.trim();
    let hex = account.strip_prefix("0x").unwrap_or(account);
    if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Address::from_hex(hex)
    } else if account.is_empty() {
        Err(Error::ZeroAddress)
    } else {
        Ok(Address::from_label(account))
    }
}

fn parse_price(text: &str) -> Result<u64> {
    let raw = parse_units(text, PRICE_DECIMALS)?;
    u64::try_from(raw).map_err(|_| Error::Overflow {
        operation: format!("price {}", text),
    })
}

fn default_stable_price() -> String {
    "1".into()
}

fn default_confidence() -> u8 {
    90
}

fn default_weight() -> u32 {
    10
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// A scripted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// What the scenario exercises
    #[serde(default)]
    pub description: String,
    /// Account holding the Admin capability
    #[serde(default = "Scenario::default_admin")]
    pub admin: String,
    /// Configuration for a fresh engine; defaults when absent
    #[serde(default)]
    pub config: Option<ProtocolConfig>,
    /// Steps, in order
    pub steps: Vec<Step>,
}

impl Scenario {
    fn default_admin() -> String {
        "admin".into()
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(format!("scenario: {}", e)))
    }

    /// Admin address
    pub fn admin_address(&self) -> Result<Address> {
        resolve_account(&self.admin)
    }
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Start a new block
    Block {
        /// Block height
        height: u64,
        /// Block timestamp
        timestamp: u64,
    },
    /// Register a reporter
    AddReporter {
        /// Reporter account
        reporter: String,
        /// Consensus weight
        #[serde(default = "default_weight")]
        weight: u32,
    },
    /// Submit a reporter price; prices are USD decimals
    SubmitPrice {
        /// Reporter account
        reporter: String,
        /// KSM price
        ksm_price: String,
        /// DOT price
        dot_price: String,
        /// Stable price
        #[serde(default = "default_stable_price")]
        stable_price: String,
        /// KSM market cap, whole USD
        ksm_market_cap: u128,
        /// DOT market cap, whole USD
        dot_market_cap: u128,
        /// Reporter confidence
        #[serde(default = "default_confidence")]
        confidence: u8,
    },
    /// Fund an external wallet
    Credit {
        /// Account
        account: String,
        /// Asset
        asset: Asset,
        /// Whole-token amount
        amount: String,
    },
    /// Mint PARITY
    Mint {
        /// Depositor
        user: String,
        /// Deposited asset
        asset: Asset,
        /// Whole-token amount
        amount: String,
        /// Minimum PARITY out
        #[serde(default)]
        min_out: Option<String>,
    },
    /// Burn PARITY for one asset
    Burn {
        /// Burner
        user: String,
        /// PARITY presented
        parity: String,
        /// Asset to receive
        asset_out: Asset,
        /// Minimum payout in whole tokens
        #[serde(default)]
        min_out: Option<String>,
    },
    /// Burn PARITY for a liquidity-weighted mix
    MultiBurn {
        /// Burner
        user: String,
        /// PARITY presented
        parity: String,
    },
    /// Swap against the reserve
    Swap {
        /// Trader
        user: String,
        /// Asset paid
        asset_in: Asset,
        /// Whole-token amount paid
        amount_in: String,
        /// Asset wanted
        asset_out: Asset,
        /// Minimum output in whole tokens
        #[serde(default)]
        min_out: Option<String>,
    },
    /// Transfer PARITY
    Transfer {
        /// Sender
        from: String,
        /// Recipient
        to: String,
        /// PARITY amount
        parity: String,
    },
    /// Move protocol-owned liquidity into the reserve
    DepositReserve {
        /// Reserve manager
        account: String,
        /// Asset
        asset: Asset,
        /// Whole-token amount
        amount: String,
    },
    /// Run rebalance and sweep
    Maintain {
        /// Keeper
        keeper: String,
    },
    /// Halt user operations
    Pause {
        /// Pauser
        by: String,
    },
    /// Resume user operations
    Unpause {
        /// Pauser
        by: String,
    },
    /// Change a bounded parameter
    SetParameter {
        /// Admin
        by: String,
        /// Parameter key
        parameter: ProtocolParameter,
        /// New value
        value: u64,
    },
    /// Change the NAV payout mode
    SetPayoutMode {
        /// Admin
        by: String,
        /// New mode
        mode: NavPayoutMode,
    },
    /// Grant a capability
    GrantRole {
        /// Admin
        by: String,
        /// Grantee
        account: String,
        /// Capability
        capability: Capability,
    },
    /// The wrapped step must fail and leave no trace
    ExpectFailure(Box<Step>),
    /// Stop with an error unless every invariant holds
    CheckInvariants,
}

impl Step {
    /// Step name
    pub fn name(&self) -> &'static str {
        match self {
            Step::Block { .. } => "block",
            Step::AddReporter { .. } => "add_reporter",
            Step::SubmitPrice { .. } => "submit_price",
            Step::Credit { .. } => "credit",
            Step::Mint { .. } => "mint",
            Step::Burn { .. } => "burn",
            Step::MultiBurn { .. } => "multi_burn",
            Step::Swap { .. } => "swap",
            Step::Transfer { .. } => "transfer",
            Step::DepositReserve { .. } => "deposit_reserve",
            Step::Maintain { .. } => "maintain",
            Step::Pause { .. } => "pause",
            Step::Unpause { .. } => "unpause",
            Step::SetParameter { .. } => "set_parameter",
            Step::SetPayoutMode { .. } => "set_payout_mode",
            Step::GrantRole { .. } => "grant_role",
            Step::ExpectFailure(_) => "expect_failure",
            Step::CheckInvariants => "check_invariants",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNER
// ═══════════════════════════════════════════════════════════════════════════════

/// What one step did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Position in the scenario
    pub index: usize,
    /// Step name
    pub step: String,
    /// Result summary, or the expected error
    pub outcome: String,
}

/// Result of a scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Per-step reports
    pub steps: Vec<StepReport>,
    /// Events committed during the run, by block
    pub events: Vec<ProtocolEvent>,
    /// Statistics after the last step
    pub statistics: ProtocolStatistics,
}

/// Drives a scenario against an engine
pub struct ScenarioRunner<A: AuthorizationPolicy = RoleRegistry> {
    engine: ProtocolEngine<A>,
    admin: Address,
    events: Vec<ProtocolEvent>,
}

impl ScenarioRunner<RoleRegistry> {
    /// Fresh engine for `scenario`
    pub fn for_scenario(scenario: &Scenario) -> Result<Self> {
        let config = scenario.config.clone().unwrap_or_default();
        let admin = scenario.admin_address()?;
        let policy = RoleRegistry::with_admin(admin);
        Ok(Self::new(ProtocolEngine::new(config, policy)?, admin))
    }
}

impl<A: AuthorizationPolicy> ScenarioRunner<A> {
    /// Run against an existing engine; `admin` registers reporters
    pub fn new(engine: ProtocolEngine<A>, admin: Address) -> Self {
        Self {
            engine,
            admin,
            events: Vec::new(),
        }
    }

    /// Engine being driven
    pub fn engine(&self) -> &ProtocolEngine<A> {
        &self.engine
    }

    /// Give the engine back
    pub fn into_engine(self) -> ProtocolEngine<A> {
        self.engine
    }

    /// Run every step, stopping at the first unexpected outcome
    pub fn run(&mut self, scenario: &Scenario) -> Result<ScenarioReport> {
        info!(name = %scenario.name, steps = scenario.steps.len(), "Running scenario");
        let mut reports = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let outcome = self.run_step(step).map_err(|e| Error::InvalidParameter {
                name: format!("step {} ({})", index, step.name()),
                reason: e.to_string(),
            })?;
            debug!(index, step = step.name(), %outcome, "Step finished");
            reports.push(StepReport {
                index,
                step: step.name().to_string(),
                outcome,
            });
        }
        self.flush_block();
        Ok(ScenarioReport {
            name: scenario.name.clone(),
            steps: reports,
            events: std::mem::take(&mut self.events),
            statistics: self.engine.statistics(),
        })
    }

    fn flush_block(&mut self) {
        let log = self.engine.end_block();
        self.events.extend(log.events().iter().cloned());
    }

    fn run_step(&mut self, step: &Step) -> Result<String> {
        let deadline = self.engine.timestamp();
        let parity = |text: &str| parse_units(text, PARITY_DECIMALS);
        let units = |asset: Asset, text: &Option<String>| -> Result<u128> {
            text.as_deref()
                .map(|t| parse_units(t, asset.decimals()))
                .transpose()
                .map(|v| v.unwrap_or(0))
        };

        let summary = match step {
            Step::Block { height, timestamp } => {
                self.flush_block();
                self.engine.begin_block(*height, *timestamp)?;
                format!("block {} at {}", height, timestamp)
            }
            Step::AddReporter { reporter, weight } => {
                let admin = self.admin;
                self.engine.add_reporter(&admin, resolve_account(reporter)?, *weight)?;
                format!("reporter {} added with weight {}", reporter, weight)
            }
            Step::SubmitPrice {
                reporter,
                ksm_price,
                dot_price,
                stable_price,
                ksm_market_cap,
                dot_market_cap,
                confidence,
            } => {
                let result = self.engine.submit_price(SubmitPriceOp {
                    reporter: resolve_account(reporter)?,
                    submission: PriceSubmission {
                        ksm_price: parse_price(ksm_price)?,
                        dot_price: parse_price(dot_price)?,
                        stable_price: parse_price(stable_price)?,
                        ksm_market_cap: *ksm_market_cap,
                        dot_market_cap: *dot_market_cap,
                        confidence: *confidence,
                    },
                    deadline,
                })?;
                format!(
                    "consensus {} ({} of {} live)",
                    if result.consensus_updated { "updated" } else { "unchanged" },
                    result.live_reporters,
                    result.quorum
                )
            }
            Step::Credit { account, asset, amount } => {
                let amount = parse_units(amount, asset.decimals())?;
                self.engine.credit_collateral(resolve_account(account)?, *asset, amount)?;
                format!("credited {} {}", amount, asset)
            }
            Step::Mint { user, asset, amount, min_out } => {
                let result = self.engine.mint(MintOp {
                    user: resolve_account(user)?,
                    asset: *asset,
                    amount: parse_units(amount, asset.decimals())?,
                    min_parity_out: min_out.as_deref().map(parity).transpose()?.unwrap_or(0),
                    deadline,
                })?;
                format!("minted {} PARITY (fee {})", result.parity_minted, result.fee_parity)
            }
            Step::Burn { user, parity: amount, asset_out, min_out } => {
                let result = self.engine.burn(BurnOp {
                    user: resolve_account(user)?,
                    parity_amount: parity(amount)?,
                    asset_out: *asset_out,
                    min_amount_out: units(*asset_out, min_out)?,
                    deadline,
                })?;
                burn_summary(&result)
            }
            Step::MultiBurn { user, parity: amount } => {
                let result = self.engine.multi_burn(MultiBurnOp {
                    user: resolve_account(user)?,
                    parity_amount: parity(amount)?,
                    min_amounts_out: AssetBalances::ZERO,
                    deadline,
                })?;
                burn_summary(&result)
            }
            Step::Swap { user, asset_in, amount_in, asset_out, min_out } => {
                let result = self.engine.swap(SwapOp {
                    user: resolve_account(user)?,
                    asset_in: *asset_in,
                    amount_in: parse_units(amount_in, asset_in.decimals())?,
                    asset_out: *asset_out,
                    min_amount_out: units(*asset_out, min_out)?,
                    deadline,
                })?;
                format!(
                    "swapped for {} {} at {} bps slippage",
                    result.quote.output_amount, asset_out, result.quote.slippage_bps
                )
            }
            Step::Transfer { from, to, parity: amount } => {
                let result = self.engine.transfer(TransferOp {
                    from: resolve_account(from)?,
                    to: resolve_account(to)?,
                    amount: parity(amount)?,
                    deadline,
                })?;
                format!("sender now holds {}", result.from_balance)
            }
            Step::DepositReserve { account, asset, amount } => {
                let amount = parse_units(amount, asset.decimals())?;
                self.engine.deposit_reserve(&resolve_account(account)?, *asset, amount)?;
                format!("reserve received {} {}", amount, asset)
            }
            Step::Maintain { keeper } => {
                let report = self.engine.run_maintenance(&resolve_account(keeper)?)?;
                format!("rebalance: {:?}; sweep: {:?}", report.rebalance, report.sweep)
            }
            Step::Pause { by } => {
                self.engine.pause(&resolve_account(by)?)?;
                "paused".into()
            }
            Step::Unpause { by } => {
                self.engine.unpause(&resolve_account(by)?)?;
                "unpaused".into()
            }
            Step::SetParameter { by, parameter, value } => {
                let change = self.engine.update_parameter(&resolve_account(by)?, *parameter, *value)?;
                format!("{}: {} -> {}", parameter, change.old_value, change.new_value)
            }
            Step::SetPayoutMode { by, mode } => {
                self.engine.set_payout_mode(&resolve_account(by)?, *mode)?;
                format!("payout mode {:?}", mode)
            }
            Step::GrantRole { by, account, capability } => {
                self.engine.grant_role(&resolve_account(by)?, resolve_account(account)?, *capability)?;
                format!("{} granted to {}", capability, account)
            }
            Step::ExpectFailure(inner) => {
                let before = self.engine.state().clone();
                match self.run_step(inner) {
                    Ok(outcome) => {
                        return Err(Error::InvariantViolation(format!(
                            "{} was expected to fail but returned: {}",
                            inner.name(),
                            outcome
                        )))
                    }
                    Err(e) => {
                        if self.engine.state() != &before {
                            return Err(Error::InvariantViolation(format!(
                                "failed {} changed engine state",
                                inner.name()
                            )));
                        }
                        format!("failed as expected: {}", e)
                    }
                }
            }
            Step::CheckInvariants => {
                self.engine.verify_invariants()?;
                "invariants hold".into()
            }
        };
        Ok(summary)
    }
}

fn burn_summary(result: &BurnResult) -> String {
    format!(
        "burned {} PARITY (fee {}, policy {} bps), received {:?}",
        result.parity_burned, result.fee_parity, result.policy_bps, result.total_payout
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::PARITY_BASE_UNIT as PARITY_UNIT;

    const FIRST_MINT: &str = r#"{
        "name": "first mint",
        "config": { "maintenance": { "auto_run": false } },
        "steps": [
            { "block": { "height": 1, "timestamp": 1000 } },
            { "add_reporter": { "reporter": "r1" } },
            { "submit_price": { "reporter": "r1", "ksm_price": "20", "dot_price": "5",
                                "ksm_market_cap": 150000000, "dot_market_cap": 7500000000 } },
            { "credit": { "account": "alice", "asset": "stable", "amount": "1000" } },
            { "mint": { "user": "alice", "asset": "stable", "amount": "1000" } },
            { "expect_failure": { "burn": { "user": "bob", "parity": "1", "asset_out": "stable" } } },
            { "block": { "height": 2, "timestamp": 1012 } },
            { "burn": { "user": "alice", "parity": "100", "asset_out": "stable" } },
            { "expect_failure": { "burn": { "user": "alice", "parity": "1", "asset_out": "stable" } } },
            "check_invariants"
        ]
    }"#;

    #[test]
    fn test_resolve_account() {
        assert_eq!(resolve_account("alice").unwrap(), Address::from_label("alice"));
        let hex = Address::from_label("bob").to_hex();
        assert_eq!(resolve_account(&hex).unwrap(), Address::from_label("bob"));
        assert_eq!(resolve_account("  "), Err(Error::ZeroAddress));
    }

    #[test]
    fn test_run_scenario() {
        let scenario = Scenario::from_json(FIRST_MINT).unwrap();
        assert_eq!(scenario.admin, "admin");

        let mut runner = ScenarioRunner::for_scenario(&scenario).unwrap();
        let report = runner.run(&scenario).unwrap();
        assert_eq!(report.steps.len(), scenario.steps.len());
        assert!(report.steps[5].outcome.starts_with("failed as expected"));

        let alice = runner.engine().user_position(&Address::from_label("alice"));
        assert_eq!(alice.parity_balance, 3_985 * PARITY_UNIT / 10);
        assert_eq!(alice.last_burn_block, Some(2));
        assert_eq!(report.statistics.counters.burn_count, 1);
        assert!(report.events.iter().any(|e| e.event_type() == "Burned"));
    }

    #[test]
    fn test_unexpected_success_stops_run() {
        let scenario = Scenario::from_json(
            r#"{ "name": "bad", "steps": [
                { "block": { "height": 1, "timestamp": 10 } },
                { "expect_failure": { "credit": { "account": "a", "asset": "dot", "amount": "1" } } }
            ] }"#,
        )
        .unwrap();
        let mut runner = ScenarioRunner::for_scenario(&scenario).unwrap();
        let err = runner.run(&scenario).unwrap_err();
        assert!(err.to_string().contains("step 1 (expect_failure)"));
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        assert!(matches!(
            Scenario::from_json(r#"{ "name": "x", "steps": [ { "teleport": {} } ] }"#),
            Err(Error::Deserialization(_))
        ));
    }
}
