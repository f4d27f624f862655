//! Protocol engine - the PARITY orchestrator.
//!
//! The engine owns every component in a single arena, [`EngineState`],
//! and wires them together per call instead of letting components hold
//! references to each other. Every public entry point that mutates state
//! runs as a transaction:
//! - the state is snapshotted and the Core lock taken
//! - the operation runs, buffering its events
//! - on success the events reach the block's [`EventLog`]; on failure the
//!   snapshot is restored and the events are dropped
//!
//! Rebalancing and surplus sweeps are best-effort. They run in their own
//! transactions after a committed mint or burn (when enabled) or on an
//! explicit keeper call, and a failure is logged and recorded as a
//! `MaintenanceFailed` event instead of reaching the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::core::access::{AuthorizationPolicy, Capability, RoleRegistry};
use crate::core::asset::{Asset, AssetBalances};
use crate::core::collateral::CollateralLedger;
use crate::core::config::ProtocolConfig;
use crate::core::token::{ParityToken, TokenAmount};
use crate::error::{Error, Result};
use crate::governance::{ParameterChange, ProtocolParameter};
use crate::nav::{NavAccumulator, NavPayoutMode, RebalanceOutcome};
use crate::oracle::{ConsensusOutcome, OracleConsensus};
use crate::policy::{evaluate_burn_policy, BaselineTracker, PolicyInput};
use crate::protocol::calculations::*;
use crate::protocol::events::*;
use crate::protocol::guard::{Component, LockTable};
use crate::protocol::operations::*;
use crate::protocol::statistics::{ProtocolCounters, ProtocolStatistics, UserPosition};
use crate::reserve::{ReserveLedger, ReserveValuation, SurplusSweeper, SweepOutcome};
use crate::trading::{PmmEngine, PmmQuote, SwapOrder, SwapReceipt};
use crate::utils::crypto::Address;
use crate::utils::constants::PARITY_DECIMALS;
use crate::utils::math::{bps_of, safe_add, safe_sub, usd_value};
use crate::utils::validation::{
    validate_address, validate_deadline, validate_non_zero, OperationContext,
};

/// Account the NAV pool trades as when it rebalances
pub fn nav_pool_address() -> Address {
    Address::from_label("parity/nav-pool")
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Every component of the protocol, persisted and restored as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// PARITY ledger
    pub token: ParityToken,
    /// Collateral wallets of every account
    pub collateral: CollateralLedger,
    /// Oracle consensus
    pub oracle: OracleConsensus,
    /// Reserve ledger
    pub reserve: ReserveLedger,
    /// PMM trading engine
    pub pmm: PmmEngine,
    /// NAV accumulator
    pub nav: NavAccumulator,
    /// Surplus sweeper
    pub sweeper: SurplusSweeper,
    /// Activity baselines
    pub baselines: BaselineTracker,
    /// Cumulative counters
    pub counters: ProtocolCounters,
    /// Active configuration
    pub config: ProtocolConfig,
    /// User operations halted
    pub paused: bool,
    /// Block of each account's last burn
    pub last_burn: BTreeMap<Address, u64>,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
}

impl EngineState {
    /// Fresh state for `config`
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            token: ParityToken::new(),
            collateral: CollateralLedger::new(),
            oracle: OracleConsensus::new(config.oracle.clone()),
            reserve: ReserveLedger::new(config.reserve.clone()),
            pmm: PmmEngine::new(config.trading.clone()),
            nav: NavAccumulator::new(config.nav.clone()),
            sweeper: SurplusSweeper::new(),
            baselines: BaselineTracker::new(),
            counters: ProtocolCounters::default(),
            config,
            paused: false,
            last_burn: BTreeMap::new(),
            block_height: 0,
            timestamp: 0,
        }
    }
}

/// Where a burn takes its reserve payout from
#[derive(Debug, Clone, Copy)]
enum BurnRoute<'a> {
    /// One asset
    Single { asset: Asset, min_out: u128 },
    /// Every asset, weighted by available liquidity
    Multi { min_out: &'a AssetBalances },
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// The PARITY protocol engine
pub struct ProtocolEngine<A: AuthorizationPolicy = RoleRegistry> {
    state: EngineState,
    policy: A,
    locks: LockTable,
    /// Committed events of the current block
    event_log: EventLog,
    /// Events of the transaction in progress
    pending: Vec<ProtocolEvent>,
}

impl<A: AuthorizationPolicy> ProtocolEngine<A> {
    /// Create an engine with fresh state
    pub fn new(config: ProtocolConfig, policy: A) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_state(EngineState::new(config), policy))
    }

    /// Resume from persisted state
    pub fn from_state(state: EngineState, policy: A) -> Self {
        Self {
            state,
            policy,
            locks: LockTable::new(),
            event_log: EventLog::new(),
            pending: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Consume the engine, keeping its state
    pub fn into_state(self) -> EngineState {
        self.state
    }

    /// Authorization policy in force
    pub fn policy(&self) -> &A {
        &self.policy
    }

    /// Active configuration
    pub fn config(&self) -> &ProtocolConfig {
        &self.state.config
    }

    /// Component locks
    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Current block height
    pub fn block_height(&self) -> u64 {
        self.state.block_height
    }

    /// Current timestamp
    pub fn timestamp(&self) -> u64 {
        self.state.timestamp
    }

    /// Events committed in the current block
    pub fn events(&self) -> &EventLog {
        &self.event_log
    }

    /// Whether user operations are halted
    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    /// Credit an external collateral wallet directly, standing in for a faucet
    pub fn credit_collateral(&mut self, owner: Address, asset: Asset, amount: u128) -> Result<()> {
        self.state.collateral.credit(owner, asset, amount)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BLOCK PROCESSING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Begin a new block
    pub fn begin_block(&mut self, height: u64, timestamp: u64) -> Result<()> {
        if height < self.state.block_height || timestamp < self.state.timestamp {
            return Err(Error::InvalidParameter {
                name: "block".into(),
                reason: format!(
                    "block {} at {} is behind block {} at {}",
                    height, timestamp, self.state.block_height, self.state.timestamp
                ),
            });
        }
        self.state.block_height = height;
        self.state.timestamp = timestamp;
        self.event_log.clear();
        Ok(())
    }

    /// End the current block and return its events
    pub fn end_block(&mut self) -> EventLog {
        std::mem::take(&mut self.event_log)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSACTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let _core = self.locks.acquire(Component::Core)?;
        let snapshot = self.state.clone();
        self.pending.clear();

        let result = op(self);
        match &result {
            Ok(_) => {
                for event in std::mem::take(&mut self.pending) {
                    self.event_log.push(event);
                }
            }
            Err(e) => {
                self.state = snapshot;
                self.pending.clear();
                debug!(error = %e, "Transaction rolled back");
            }
        }
        result
    }

    fn emit(&mut self, event: ProtocolEvent) {
        self.pending.push(event);
    }

    fn clock(&self) -> (u64, u64) {
        (self.state.block_height, self.state.timestamp)
    }

    fn context(&self, user: &Address) -> OperationContext {
        let now = self.state.timestamp;
        OperationContext {
            paused: self.state.paused,
            now,
            block_height: self.state.block_height,
            oracle: self.state.oracle.require_fresh(now).map(|_| ()),
            last_burn_block: self.state.last_burn.get(user).copied(),
        }
    }

    /// Fresh market state for reserve checks
    pub fn valuation(&self) -> Result<ReserveValuation> {
        let now = self.state.timestamp;
        Ok(ReserveValuation {
            prices: self.state.oracle.prices(now)?,
            supply: self.state.token.total_supply().raw(),
            parity_price: self.state.oracle.parity_price(now)?,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATION EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Execute a protocol operation
    pub fn execute(&mut self, op: ProtocolOperation) -> Result<OperationResult> {
        match op {
            ProtocolOperation::Mint(op) => self.mint(op).map(OperationResult::Mint),
            ProtocolOperation::Burn(op) => self.burn(op).map(OperationResult::Burn),
            ProtocolOperation::MultiBurn(op) => self.multi_burn(op).map(OperationResult::Burn),
            ProtocolOperation::Swap(op) => self.swap(op).map(OperationResult::Swap),
            ProtocolOperation::Transfer(op) => self.transfer(op).map(OperationResult::Transfer),
            ProtocolOperation::SubmitPrice(op) => {
                self.submit_price(op).map(OperationResult::SubmitPrice)
            }
        }
    }

    /// Deposit collateral and mint PARITY
    pub fn mint(&mut self, op: MintOp) -> Result<MintResult> {
        let result = self.transact(|engine| engine.execute_mint(&op))?;
        self.after_user_operation();
        Ok(result)
    }

    /// Burn PARITY for one collateral asset
    pub fn burn(&mut self, op: BurnOp) -> Result<BurnResult> {
        let route = BurnRoute::Single {
            asset: op.asset_out,
            min_out: op.min_amount_out,
        };
        let result =
            self.transact(|engine| engine.execute_burn(op.user, op.parity_amount, op.deadline, route))?;
        self.after_user_operation();
        Ok(result)
    }

    /// Burn PARITY for a liquidity-weighted mix of collateral
    pub fn multi_burn(&mut self, op: MultiBurnOp) -> Result<BurnResult> {
        let route = BurnRoute::Multi {
            min_out: &op.min_amounts_out,
        };
        let result =
            self.transact(|engine| engine.execute_burn(op.user, op.parity_amount, op.deadline, route))?;
        self.after_user_operation();
        Ok(result)
    }

    /// Swap collateral against the reserve
    pub fn swap(&mut self, op: SwapOp) -> Result<SwapResult> {
        self.transact(|engine| engine.execute_swap(&op))
    }

    /// Transfer PARITY
    pub fn transfer(&mut self, op: TransferOp) -> Result<TransferResult> {
        self.transact(|engine| engine.execute_transfer(&op))
    }

    /// Submit a reporter price
    pub fn submit_price(&mut self, op: SubmitPriceOp) -> Result<SubmitPriceResult> {
        self.transact(|engine| engine.execute_submit_price(&op))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MINT
    // ═══════════════════════════════════════════════════════════════════════════

    fn execute_mint(&mut self, op: &MintOp) -> Result<MintResult> {
        let now = self.state.timestamp;
        self.context(&op.user)
            .validate_for_mint(op.amount, &op.user, op.deadline)?;

        let prices = self.state.oracle.prices(now)?;
        let parity_price = self.state.oracle.parity_price(now)?;
        let calc = calculate_mint(&MintParams {
            asset: op.asset,
            amount: op.amount,
            asset_price: prices.get(op.asset),
            parity_price,
            nav_contribution_bps: self.state.config.nav.contribution_bps,
            mint_fee_bps: self.state.config.fees.mint_fee_bps,
        })?;
        let floor = slippage_floor(
            calc.net_parity,
            op.min_parity_out,
            self.state.config.trading.default_slippage_floor_bps,
        )?;
        check_min_output(calc.net_parity, floor)?;

        // Pull the deposit, then split it between the NAV pool and the reserve
        self.state.collateral.debit(&op.user, op.asset, op.amount)?;
        if calc.nav_amount > 0 {
            let _nav = self.locks.acquire(Component::Nav)?;
            self.state.nav.contribute(op.asset, calc.nav_amount)?;
        }
        if calc.reserve_amount > 0 {
            let _reserve = self.locks.acquire(Component::Reserve)?;
            self.state.reserve.deposit(op.asset, calc.reserve_amount)?;
        }

        let sink = self.state.config.sweep.sink;
        self.state.token.mint(op.user, TokenAmount::from(calc.net_parity))?;
        if calc.fee_parity > 0 {
            self.state.token.mint(sink, TokenAmount::from(calc.fee_parity))?;
        }

        let supply = self.state.token.total_supply().raw();
        self.state.baselines.record_mint(op.user, calc.net_parity, supply)?;
        if calc.fee_parity > 0 {
            self.state.baselines.record_mint(sink, calc.fee_parity, supply)?;
        }
        self.state.counters.record_mint(calc.gross_parity, calc.fee_parity)?;

        let (block_height, timestamp) = self.clock();
        if calc.nav_amount > 0 {
            self.emit(ProtocolEvent::NavContributed(NavContributedEvent {
                amounts: AssetBalances::single(op.asset, calc.nav_amount),
                block_height,
                timestamp,
            }));
        }
        self.emit(ProtocolEvent::Minted(MintedEvent {
            user: op.user,
            asset: op.asset,
            amount: op.amount,
            parity_minted: calc.net_parity,
            fee_parity: calc.fee_parity,
            nav_amount: calc.nav_amount,
            reserve_amount: calc.reserve_amount,
            parity_price,
            block_height,
            timestamp,
        }));

        info!(
            user = %op.user.short(),
            asset = %op.asset,
            amount = op.amount,
            parity = calc.net_parity,
            fee = calc.fee_parity,
            parity_price,
            "PARITY minted"
        );

        Ok(MintResult {
            parity_minted: calc.net_parity,
            fee_parity: calc.fee_parity,
            nav_amount: calc.nav_amount,
            reserve_amount: calc.reserve_amount,
            collateral_usd: calc.collateral_usd,
            parity_price,
        })
    }

    /// Price a mint without executing it
    pub fn preview_mint(&self, asset: Asset, amount: u128) -> Result<MintCalculation> {
        let now = self.state.timestamp;
        let prices = self.state.oracle.prices(now)?;
        calculate_mint(&MintParams {
            asset,
            amount,
            asset_price: prices.get(asset),
            parity_price: self.state.oracle.parity_price(now)?,
            nav_contribution_bps: self.state.config.nav.contribution_bps,
            mint_fee_bps: self.state.config.fees.mint_fee_bps,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BURN
    // ═══════════════════════════════════════════════════════════════════════════

    fn execute_burn(
        &mut self,
        user: Address,
        parity_amount: u128,
        deadline: u64,
        route: BurnRoute<'_>,
    ) -> Result<BurnResult> {
        let now = self.state.timestamp;
        self.context(&user)
            .validate_for_burn(parity_amount, &user, deadline)?;
        let balance = self.state.token.balance_of(&user).raw();
        if balance < parity_amount {
            return Err(Error::InsufficientBalance {
                required: parity_amount,
                available: balance,
            });
        }

        let prices = self.state.oracle.prices(now)?;
        let parity_price = self.state.oracle.parity_price(now)?;
        let supply = self.state.token.total_supply().raw();
        let config = self.state.config.clone();
        let floor_bps = config.trading.default_slippage_floor_bps;

        let net_parity = safe_sub(parity_amount, bps_of(parity_amount, config.fees.burn_fee_bps)?)?;
        let decision = evaluate_burn_policy(
            &config.policy,
            &PolicyInput {
                total_supply: supply,
                baseline: self.state.baselines.get(&user),
                burn_amount: net_parity,
            },
        )?;
        let liquidity = self.state.reserve.liquidity_usd(&prices)?;
        let route_liquidity_usd = match route {
            BurnRoute::Single { asset, .. } => liquidity.get(asset),
            BurnRoute::Multi { .. } => liquidity.sum()?,
        };
        let calc = calculate_burn(&BurnParams {
            parity_amount,
            total_supply: supply,
            parity_price,
            burn_fee_bps: config.fees.burn_fee_bps,
            policy: decision,
            payout_mode: config.nav.payout_mode,
            nav_value_usd: self.state.nav.total_value_usd(&prices)?,
            reserve_liquidity_usd: route_liquidity_usd,
        })?;

        // The fee is charged in PARITY and kept by the sink
        let sink = config.sweep.sink;
        if calc.fee_parity > 0 {
            self.state
                .token
                .transfer(user, sink, TokenAmount::from(calc.fee_parity))?;
            self.state.baselines.record_transfer(&user, sink, calc.fee_parity)?;
        }

        let (reserve_payout, nav_contribution) = match route {
            BurnRoute::Single { asset, min_out } => {
                let price = prices.get(asset);
                let payout = asset.amount_for_usd(calc.user_usd, price)?;
                let contribution = asset.amount_for_usd(calc.contribution_usd, price)?;
                check_min_output(payout, slippage_floor(payout, min_out, floor_bps)?)?;
                (
                    AssetBalances::single(asset, payout),
                    AssetBalances::single(asset, contribution),
                )
            }
            BurnRoute::Multi { min_out } => {
                // Fails unless the reserve covers payout and contribution together
                allocate_by_liquidity(safe_add(calc.user_usd, calc.contribution_usd)?, &liquidity)?;
                let payout = usd_to_amounts(&allocate_by_liquidity(calc.user_usd, &liquidity)?, &prices)?;
                let contribution = usd_to_amounts(
                    &allocate_by_liquidity(calc.contribution_usd, &liquidity)?,
                    &prices,
                )?;
                for (asset, amount) in payout.iter() {
                    check_min_output(amount, slippage_floor(amount, min_out.get(asset), floor_bps)?)?;
                }
                (payout, contribution)
            }
        };

        let mut withdrawal = reserve_payout;
        withdrawal.credit_all(&nav_contribution)?;
        {
            let _reserve = self.locks.acquire(Component::Reserve)?;
            self.state.reserve.withdraw_batch_for_burn(&withdrawal)?;
        }

        let nav_payout = {
            let _nav = self.locks.acquire(Component::Nav)?;
            for (asset, amount) in nav_contribution.iter() {
                if amount > 0 {
                    self.state.nav.contribute(asset, amount)?;
                }
            }
            let plan = if calc.premium_usd > 0 {
                self.state.nav.plan_premium(calc.premium_usd, &prices)?
            } else if config.nav.payout_mode == NavPayoutMode::ProportionalBonus {
                self.state.nav.plan_bonus(calc.net_parity, supply, &prices)?
            } else {
                AssetBalances::ZERO
            };
            self.state.nav.distribute(&plan)?;
            plan
        };

        let mut total_payout = reserve_payout;
        total_payout.credit_all(&nav_payout)?;
        for (asset, amount) in total_payout.iter() {
            self.state.collateral.credit(user, asset, amount)?;
        }

        self.state.token.burn(user, TokenAmount::from(calc.net_parity))?;
        self.state.baselines.record_burn(&user, calc.net_parity)?;
        self.state.last_burn.insert(user, self.state.block_height);
        self.state
            .counters
            .record_burn(calc.net_parity, calc.fee_parity, &total_payout)?;

        let (block_height, timestamp) = self.clock();
        if calc.fee_parity > 0 {
            self.emit(ProtocolEvent::Transferred(TransferredEvent {
                from: user,
                to: sink,
                amount: calc.fee_parity,
                block_height,
                timestamp,
            }));
        }
        if !nav_contribution.is_empty() {
            self.emit(ProtocolEvent::NavContributed(NavContributedEvent {
                amounts: nav_contribution,
                block_height,
                timestamp,
            }));
        }
        if !nav_payout.is_empty() {
            self.emit(ProtocolEvent::NavDistributed(NavDistributedEvent {
                recipient: user,
                amounts: nav_payout,
                block_height,
                timestamp,
            }));
        }
        self.emit(ProtocolEvent::Burned(BurnedEvent {
            user,
            parity_burned: calc.net_parity,
            fee_parity: calc.fee_parity,
            policy_bps: calc.policy_bps,
            reserve_payout,
            nav_contribution,
            nav_payout,
            final_burn: calc.final_burn,
            block_height,
            timestamp,
        }));

        info!(
            user = %user.short(),
            parity = calc.net_parity,
            fee = calc.fee_parity,
            policy_bps = calc.policy_bps,
            base_usd = calc.base_usd,
            final_burn = calc.final_burn,
            "PARITY burned"
        );

        Ok(BurnResult {
            parity_amount,
            fee_parity: calc.fee_parity,
            parity_burned: calc.net_parity,
            base_usd: calc.base_usd,
            policy_bps: calc.policy_bps,
            reserve_payout,
            nav_contribution,
            nav_payout,
            total_payout,
            final_burn: calc.final_burn,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SWAP / TRANSFER / PRICES
    // ═══════════════════════════════════════════════════════════════════════════

    fn execute_swap(&mut self, op: &SwapOp) -> Result<SwapResult> {
        self.context(&op.user)
            .validate_for_trade(op.amount_in, &op.user, op.deadline)?;
        let valuation = self.valuation()?;

        self.state.collateral.debit(&op.user, op.asset_in, op.amount_in)?;
        let order = SwapOrder {
            asset_in: op.asset_in,
            amount_in: op.amount_in,
            asset_out: op.asset_out,
            min_output: op.min_amount_out,
        };
        let receipt = self
            .state
            .pmm
            .swap(&mut self.state.reserve, &order, &valuation, &self.locks)?;
        self.state
            .collateral
            .credit(op.user, op.asset_out, receipt.quote.output_amount)?;
        self.state.counters.swap_count += 1;
        self.emit_swap(op.user, &receipt);

        Ok(SwapResult {
            quote: receipt.quote,
            min_output: receipt.min_output,
            anomalous: receipt.anomalous,
        })
    }

    /// Price a swap without executing it
    pub fn quote_swap(&self, asset_in: Asset, amount_in: u128, asset_out: Asset) -> Result<PmmQuote> {
        let valuation = self.valuation()?;
        self.state
            .pmm
            .quote(&self.state.reserve, asset_in, amount_in, asset_out, &valuation)
    }

    fn emit_swap(&mut self, trader: Address, receipt: &SwapReceipt) {
        let (block_height, timestamp) = self.clock();
        let quote = receipt.quote;
        self.emit(ProtocolEvent::Swapped(SwappedEvent {
            trader,
            asset_in: quote.asset_in,
            amount_in: quote.amount_in,
            asset_out: quote.asset_out,
            amount_out: quote.output_amount,
            slippage_bps: quote.slippage_bps,
            fee_amount: quote.fee_amount,
            block_height,
            timestamp,
        }));
        if receipt.anomalous {
            self.emit(ProtocolEvent::SlippageAnomaly(SlippageAnomalyEvent {
                asset_in: quote.asset_in,
                asset_out: quote.asset_out,
                slippage_bps: quote.slippage_bps,
                block_height,
                timestamp,
            }));
        }
    }

    fn execute_transfer(&mut self, op: &TransferOp) -> Result<TransferResult> {
        if self.state.paused {
            return Err(Error::ProtocolPaused);
        }
        validate_deadline(op.deadline, self.state.timestamp)?;
        validate_non_zero(op.amount)?;
        validate_address(&op.to)?;

        self.state
            .token
            .transfer(op.from, op.to, TokenAmount::from(op.amount))?;
        self.state.baselines.record_transfer(&op.from, op.to, op.amount)?;
        self.state.counters.transfer_count += 1;

        let (block_height, timestamp) = self.clock();
        self.emit(ProtocolEvent::Transferred(TransferredEvent {
            from: op.from,
            to: op.to,
            amount: op.amount,
            block_height,
            timestamp,
        }));

        Ok(TransferResult {
            from_balance: self.state.token.balance_of(&op.from).raw(),
            to_balance: self.state.token.balance_of(&op.to).raw(),
        })
    }

    fn execute_submit_price(&mut self, op: &SubmitPriceOp) -> Result<SubmitPriceResult> {
        let now = self.state.timestamp;
        validate_deadline(op.deadline, now)?;
        let outcome = self.state.oracle.submit_price(&op.reporter, op.submission, now)?;

        let (block_height, timestamp) = self.clock();
        self.emit(ProtocolEvent::PriceSubmitted(PriceSubmittedEvent {
            reporter: op.reporter,
            prices: outcome.reporter_record.prices,
            confidence: outcome.reporter_record.confidence,
            block_height,
            timestamp,
        }));

        let quorum = self.state.oracle.quorum();
        let (consensus_updated, live_reporters) = match outcome.consensus {
            ConsensusOutcome::Updated {
                record,
                live_reporters,
            } => {
                self.emit(ProtocolEvent::ConsensusUpdated(ConsensusUpdatedEvent {
                    prices: record.prices,
                    consensus_ratio: record.consensus_ratio,
                    confidence: record.confidence,
                    live_reporters,
                    block_height,
                    timestamp,
                }));
                (true, live_reporters)
            }
            ConsensusOutcome::QuorumNotMet {
                live_reporters,
                quorum,
            } => {
                self.emit(ProtocolEvent::QuorumNotMet(QuorumNotMetEvent {
                    live_reporters,
                    quorum,
                    block_height,
                    timestamp,
                }));
                (false, live_reporters)
            }
        };
        if outcome.bootstrap_completed {
            info!(quorum, "Oracle bootstrap completed");
            self.emit(ProtocolEvent::BootstrapCompleted(BootstrapCompletedEvent {
                quorum,
                block_height,
                timestamp,
            }));
        }

        Ok(SubmitPriceResult {
            consensus_updated,
            live_reporters,
            quorum,
            bootstrap_completed: outcome.bootstrap_completed,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MAINTENANCE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Rebalance the NAV pool and sweep reserve surplus (Keeper)
    pub fn run_maintenance(&mut self, caller: &Address) -> Result<MaintenanceReport> {
        self.policy.authorize(caller, Capability::Keeper)?;
        Ok(self.maintain())
    }

    fn after_user_operation(&mut self) {
        if self.state.config.maintenance.auto_run && !self.state.paused {
            let report = self.maintain();
            debug!(changed = report.changed_state(), "Opportunistic maintenance finished");
        }
    }

    fn maintain(&mut self) -> MaintenanceReport {
        let rebalance = self
            .transact(|engine| engine.execute_rebalance())
            .map_err(|e| self.record_maintenance_failure("rebalance", e));
        let sweep = self
            .transact(|engine| engine.execute_sweep())
            .map_err(|e| self.record_maintenance_failure("sweep", e));
        MaintenanceReport { rebalance, sweep }
    }

    fn record_maintenance_failure(&mut self, task: &str, error: Error) -> String {
        warn!(task, error = %error, "Maintenance task failed, skipped");
        let reason = error.to_string();
        let (block_height, timestamp) = self.clock();
        self.event_log
            .push(ProtocolEvent::MaintenanceFailed(MaintenanceFailedEvent {
                task: task.into(),
                reason: reason.clone(),
                block_height,
                timestamp,
            }));
        reason
    }

    fn execute_rebalance(&mut self) -> Result<RebalanceOutcome> {
        let valuation = self.valuation()?;
        let now = self.state.timestamp;
        let state = &mut self.state;
        let outcome = state
            .nav
            .rebalance(&mut state.pmm, &mut state.reserve, &valuation, &self.locks, now)?;

        if let RebalanceOutcome::Rebalanced { swaps, holdings } = &outcome {
            let trader = nav_pool_address();
            for receipt in swaps {
                self.emit_swap(trader, receipt);
            }
            let (block_height, timestamp) = self.clock();
            self.emit(ProtocolEvent::NavRebalanced(NavRebalancedEvent {
                swaps: swaps.len(),
                holdings: *holdings,
                block_height,
                timestamp,
            }));
        }
        Ok(outcome)
    }

    fn execute_sweep(&mut self) -> Result<SweepOutcome> {
        let valuation = self.valuation()?;
        let now = self.state.timestamp;
        let outcome = {
            let _reserve = self.locks.acquire(Component::Reserve)?;
            let state = &mut self.state;
            state
                .sweeper
                .sweep(&mut state.reserve, &valuation, &state.config.sweep, now)?
        };

        if let SweepOutcome::Swept {
            withdrawn,
            value_usd,
            sink,
        } = &outcome
        {
            for (asset, amount) in withdrawn.iter() {
                self.state.collateral.credit(*sink, asset, amount)?;
            }
            let (block_height, timestamp) = self.clock();
            self.emit(ProtocolEvent::SurplusSwept(SurplusSweptEvent {
                sink: *sink,
                withdrawn: *withdrawn,
                value_usd: *value_usd,
                block_height,
                timestamp,
            }));
        }
        Ok(outcome)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMINISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a reporter (Admin)
    pub fn add_reporter(&mut self, caller: &Address, reporter: Address, weight: u32) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        self.transact(|engine| {
            engine.state.oracle.add_reporter(reporter, weight)?;
            let (block_height, timestamp) = engine.clock();
            engine.emit(ProtocolEvent::ReporterAdded(ReporterAddedEvent {
                reporter,
                weight,
                block_height,
                timestamp,
            }));
            info!(reporter = %reporter.short(), weight, "Reporter added");
            Ok(())
        })
    }

    /// Remove a reporter (Admin)
    pub fn remove_reporter(&mut self, caller: &Address, reporter: &Address) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        self.transact(|engine| {
            engine.state.oracle.remove_reporter(reporter)?;
            let (block_height, timestamp) = engine.clock();
            engine.emit(ProtocolEvent::ReporterRemoved(ReporterRemovedEvent {
                reporter: *reporter,
                block_height,
                timestamp,
            }));
            info!(reporter = %reporter.short(), "Reporter removed");
            Ok(())
        })
    }

    /// Change a reporter's consensus weight (Admin)
    pub fn set_reporter_weight(&mut self, caller: &Address, reporter: &Address, weight: u32) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        let changed_by = *caller;
        self.transact(|engine| {
            let old = engine
                .state
                .oracle
                .reporters()
                .find(|r| r.address == *reporter)
                .map(|r| r.weight)
                .ok_or_else(|| Error::UnknownReporter(reporter.to_hex()))?;
            engine.state.oracle.set_reporter_weight(reporter, weight)?;
            engine.emit_parameter_change(
                format!("reporter_weight.{}", reporter.short()),
                old.to_string(),
                weight.to_string(),
                changed_by,
            );
            Ok(())
        })
    }

    /// Halt user operations (Pauser)
    pub fn pause(&mut self, caller: &Address) -> Result<()> {
        self.set_paused(caller, true)
    }

    /// Resume user operations (Pauser)
    pub fn unpause(&mut self, caller: &Address) -> Result<()> {
        self.set_paused(caller, false)
    }

    fn set_paused(&mut self, caller: &Address, paused: bool) -> Result<()> {
        self.policy.authorize(caller, Capability::Pauser)?;
        if self.state.paused == paused {
            return Ok(());
        }
        let by = *caller;
        self.transact(|engine| {
            engine.state.paused = paused;
            let (block_height, timestamp) = engine.clock();
            let event = PauseEvent {
                by,
                block_height,
                timestamp,
            };
            engine.emit(if paused {
                ProtocolEvent::Paused(event)
            } else {
                ProtocolEvent::Unpaused(event)
            });
            warn!(paused, by = %by.short(), "Protocol pause state changed");
            Ok(())
        })
    }

    /// Change a bounded protocol parameter (Admin)
    pub fn update_parameter(
        &mut self,
        caller: &Address,
        parameter: ProtocolParameter,
        value: u64,
    ) -> Result<ParameterChange> {
        self.policy.authorize(caller, Capability::Admin)?;
        let changed_by = *caller;
        self.transact(|engine| {
            let old_value = parameter.get(&engine.state.config);
            let updated = parameter.apply(&engine.state.config, value)?;
            engine.install_config(updated);
            engine.emit_parameter_change(
                parameter.key().to_string(),
                old_value.to_string(),
                value.to_string(),
                changed_by,
            );
            if parameter.is_critical() {
                warn!(%parameter, old_value, new_value = value, "Critical parameter changed");
            }
            Ok(ParameterChange {
                parameter,
                old_value,
                new_value: value,
                changed_by,
            })
        })
    }

    /// Change the account receiving fees and surplus (Admin)
    pub fn set_surplus_sink(&mut self, caller: &Address, sink: Address) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        let changed_by = *caller;
        self.transact(|engine| {
            validate_address(&sink)?;
            let mut config = engine.state.config.clone();
            let old = config.sweep.sink;
            config.sweep.sink = sink;
            config.validate()?;
            engine.install_config(config);
            engine.emit_parameter_change("surplus_sink".into(), old.to_hex(), sink.to_hex(), changed_by);
            Ok(())
        })
    }

    /// Change how burns are paid from the NAV pool (Admin)
    pub fn set_payout_mode(&mut self, caller: &Address, mode: NavPayoutMode) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        let changed_by = *caller;
        self.transact(|engine| {
            let mut config = engine.state.config.clone();
            let old = config.nav.payout_mode;
            config.nav.payout_mode = mode;
            engine.install_config(config);
            engine.emit_parameter_change(
                "nav_payout_mode".into(),
                format!("{:?}", old),
                format!("{:?}", mode),
                changed_by,
            );
            Ok(())
        })
    }

    /// Change the NAV target mix; the three weights must sum to 10 000 bps (Admin)
    pub fn set_nav_targets(&mut self, caller: &Address, ksm_bps: u64, dot_bps: u64, stable_bps: u64) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        let changed_by = *caller;
        self.transact(|engine| {
            let mut config = engine.state.config.clone();
            let old = format!(
                "{}/{}/{}",
                config.nav.target_ksm_bps, config.nav.target_dot_bps, config.nav.target_stable_bps
            );
            config.nav.target_ksm_bps = ksm_bps;
            config.nav.target_dot_bps = dot_bps;
            config.nav.target_stable_bps = stable_bps;
            config.validate()?;
            engine.install_config(config);
            engine.emit_parameter_change(
                "nav_targets".into(),
                old,
                format!("{}/{}/{}", ksm_bps, dot_bps, stable_bps),
                changed_by,
            );
            Ok(())
        })
    }

    fn install_config(&mut self, config: ProtocolConfig) {
        self.state.oracle.set_config(config.oracle.clone());
        *self.state.reserve.config_mut() = config.reserve.clone();
        *self.state.pmm.config_mut() = config.trading.clone();
        *self.state.nav.config_mut() = config.nav.clone();
        self.state.config = config;
    }

    fn emit_parameter_change(&mut self, parameter: String, old_value: String, new_value: String, changed_by: Address) {
        info!(%parameter, %old_value, %new_value, "Parameter changed");
        let (block_height, timestamp) = self.clock();
        self.emit(ProtocolEvent::ParameterChanged(ParameterChangedEvent {
            parameter,
            old_value,
            new_value,
            changed_by,
            block_height,
            timestamp,
        }));
    }

    /// Grant a capability (Admin)
    pub fn grant_role(&mut self, caller: &Address, account: Address, capability: Capability) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        self.transact(|engine| {
            engine.policy.grant(account, capability)?;
            let (block_height, timestamp) = engine.clock();
            engine.emit(ProtocolEvent::RoleGranted(RoleChangedEvent {
                account,
                capability,
                block_height,
                timestamp,
            }));
            info!(account = %account.short(), %capability, "Capability granted");
            Ok(())
        })
    }

    /// Revoke a capability (Admin)
    pub fn revoke_role(&mut self, caller: &Address, account: &Address, capability: Capability) -> Result<()> {
        self.policy.authorize(caller, Capability::Admin)?;
        self.transact(|engine| {
            engine.policy.revoke(account, capability)?;
            let (block_height, timestamp) = engine.clock();
            engine.emit(ProtocolEvent::RoleRevoked(RoleChangedEvent {
                account: *account,
                capability,
                block_height,
                timestamp,
            }));
            info!(account = %account.short(), %capability, "Capability revoked");
            Ok(())
        })
    }

    /// Move protocol-owned liquidity from the caller's wallet into the reserve (ReserveManager)
    pub fn deposit_reserve(&mut self, caller: &Address, asset: Asset, amount: u128) -> Result<()> {
        self.policy.authorize(caller, Capability::ReserveManager)?;
        let depositor = *caller;
        self.transact(|engine| {
            validate_non_zero(amount)?;
            engine.state.collateral.debit(&depositor, asset, amount)?;
            {
                let _reserve = engine.locks.acquire(Component::Reserve)?;
                engine.state.reserve.deposit(asset, amount)?;
            }
            let (block_height, timestamp) = engine.clock();
            engine.emit(ProtocolEvent::ReserveDeposited(ReserveDepositedEvent {
                depositor,
                asset,
                amount,
                block_height,
                timestamp,
            }));
            info!(depositor = %depositor.short(), %asset, amount, "Reserve liquidity deposited");
            Ok(())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Protocol-wide figures; price-derived fields are `None` while consensus is stale
    pub fn statistics(&self) -> ProtocolStatistics {
        let state = &self.state;
        let valuation = self.valuation().ok();
        let prices = valuation.map(|v| v.prices);
        ProtocolStatistics {
            block_height: state.block_height,
            timestamp: state.timestamp,
            total_supply: state.token.total_supply().raw(),
            holder_count: state.token.holder_count(),
            reserve_balances: *state.reserve.balances(),
            nav_holdings: *state.nav.holdings(),
            parity_price: valuation.map(|v| v.parity_price),
            reserve_value_usd: prices.and_then(|p| state.reserve.total_value_usd(&p).ok()),
            nav_value_usd: prices.and_then(|p| state.nav.total_value_usd(&p).ok()),
            collateral_ratio_bps: valuation.and_then(|v| state.reserve.collateral_ratio_bps(&v).ok()),
            surplus_usd: valuation.and_then(|v| state.reserve.surplus_usd(&v).ok()),
            paused: state.paused,
            reporter_count: state.oracle.reporters().count(),
            oracle_bootstrap: state.oracle.is_bootstrap(),
            rebalance_count: state.nav.rebalance_count(),
            sweep_count: state.sweeper.sweep_count(),
            total_swept_usd: state.sweeper.total_swept_usd(),
            counters: state.counters.clone(),
        }
    }

    /// One account's balances and baseline
    pub fn user_position(&self, user: &Address) -> UserPosition {
        let state = &self.state;
        let parity_balance = state.token.balance_of(user).raw();
        let parity_value_usd = state
            .oracle
            .parity_price(state.timestamp)
            .ok()
            .and_then(|price| usd_value(parity_balance, price, PARITY_DECIMALS).ok());
        UserPosition {
            parity_balance,
            collateral: state.collateral.balances_of(user),
            baseline: state.baselines.get(user),
            baseline_average: state.baselines.average(user).unwrap_or(0),
            parity_value_usd,
            last_burn_block: state.last_burn.get(user).copied(),
        }
    }

    /// Check the conservation invariants that must hold between operations
    pub fn verify_invariants(&self) -> Result<()> {
        let state = &self.state;
        if !state.token.verify_supply_invariant() {
            return Err(Error::InvariantViolation(
                "PARITY balances do not sum to total supply".into(),
            ));
        }
        if let Ok(prices) = state.oracle.prices(state.timestamp) {
            let total = state.nav.total_value_usd(&prices)?;
            let parts = state.nav.value_breakdown(&prices)?.sum()?;
            if total != parts {
                return Err(Error::InvariantViolation(format!(
                    "NAV value {} differs from per-asset sum {}",
                    total, parts
                )));
            }
        }
        if !state.pmm.escrow().is_empty() {
            return Err(Error::InvariantViolation("PMM escrow not settled".into()));
        }
        let held = self.locks.held();
        if !held.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "component locks held between operations: {:?}",
                held
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::access::AllowAll;
    use crate::oracle::PriceSubmission;
    use crate::utils::constants::{PRICE_PRECISION, STABLE_DECIMALS, WAD};

    const STABLE: u128 = 10u128.pow(STABLE_DECIMALS);

    fn admin() -> Address {
        Address::from_label("admin")
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    /// $2 PARITY: KSM cap 150M, DOT cap 7.5B, $100 multiplier
    fn submission() -> PriceSubmission {
        PriceSubmission {
            ksm_price: 20 * PRICE_PRECISION,
            dot_price: 5 * PRICE_PRECISION,
            stable_price: PRICE_PRECISION,
            ksm_market_cap: 150_000_000,
            dot_market_cap: 7_500_000_000,
            confidence: 90,
        }
    }

    fn engine_with(config: ProtocolConfig) -> ProtocolEngine<RoleRegistry> {
        let mut engine = ProtocolEngine::new(config, RoleRegistry::with_admin(admin())).unwrap();
        engine.begin_block(1, 1_000).unwrap();
        let reporter = Address::from_label("reporter");
        engine.add_reporter(&admin(), reporter, 10).unwrap();
        engine
            .submit_price(SubmitPriceOp {
                reporter,
                submission: submission(),
                deadline: 1_000,
            })
            .unwrap();
        engine
    }

    fn quiet_config() -> ProtocolConfig {
        let mut config = ProtocolConfig::default();
        config.maintenance.auto_run = false;
        config
    }

    fn mint_op(user: Address, amount: u128) -> MintOp {
        MintOp {
            user,
            asset: Asset::Stable,
            amount,
            min_parity_out: 0,
            deadline: u64::MAX,
        }
    }

    #[test]
    fn test_mint_splits_deposit() {
        let mut engine = engine_with(quiet_config());
        engine.credit_collateral(alice(), Asset::Stable, 1_000 * STABLE).unwrap();

        let result = engine.mint(mint_op(alice(), 1_000 * STABLE)).unwrap();
        assert_eq!(result.parity_price, 2 * PRICE_PRECISION);
        assert_eq!(result.parity_minted, 4_985 * WAD / 10);
        assert_eq!(result.fee_parity, 15 * WAD / 10);
        assert_eq!(result.nav_amount, 100 * STABLE);
        assert_eq!(result.reserve_amount, 900 * STABLE);

        let state = engine.state();
        assert_eq!(state.reserve.balance(Asset::Stable), 900 * STABLE);
        assert_eq!(state.nav.holdings().stable, 100 * STABLE);
        assert_eq!(state.collateral.balance(&alice(), Asset::Stable), 0);
        assert_eq!(state.token.balance_of(&state.config.sweep.sink).raw(), result.fee_parity);
        engine.verify_invariants().unwrap();
    }

    #[test]
    fn test_failed_mint_leaves_no_trace() {
        let mut engine = engine_with(quiet_config());
        engine.credit_collateral(alice(), Asset::Stable, 10 * STABLE).unwrap();
        let before = engine.state().clone();
        let events_before = engine.events().len();

        let err = engine.mint(mint_op(alice(), 20 * STABLE)).unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.events().len(), events_before);
        assert!(engine.locks().held().is_empty());
    }

    #[test]
    fn test_burn_guard_one_per_block() {
        let mut engine = engine_with(quiet_config());
        engine.credit_collateral(alice(), Asset::Stable, 1_000 * STABLE).unwrap();
        let minted = engine.mint(mint_op(alice(), 1_000 * STABLE)).unwrap();

        let burn = |amount| BurnOp {
            user: alice(),
            parity_amount: amount,
            asset_out: Asset::Stable,
            min_amount_out: 0,
            deadline: u64::MAX,
        };
        engine.burn(burn(minted.parity_minted / 4)).unwrap();
        assert!(matches!(
            engine.burn(burn(minted.parity_minted / 4)),
            Err(Error::BurnAlreadyThisBlock { block: 1 })
        ));

        engine.begin_block(2, 1_010).unwrap();
        engine.burn(burn(minted.parity_minted / 4)).unwrap();
    }

    #[test]
    fn test_paused_rejects_user_operations() {
        let mut engine = engine_with(quiet_config());
        engine.credit_collateral(alice(), Asset::Stable, 10 * STABLE).unwrap();
        engine.pause(&admin()).unwrap();
        assert_eq!(engine.mint(mint_op(alice(), STABLE)), Err(Error::ProtocolPaused));

        engine.unpause(&admin()).unwrap();
        engine.mint(mint_op(alice(), STABLE)).unwrap();
        assert_eq!(engine.events().filter_by_type("Paused").len(), 1);
        assert_eq!(engine.events().filter_by_type("Unpaused").len(), 1);
    }

    #[test]
    fn test_admin_entry_points_require_capability() {
        let mut engine = engine_with(quiet_config());
        let mallory = Address::from_label("mallory");
        assert!(matches!(
            engine.update_parameter(&mallory, ProtocolParameter::MintFee, 0),
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(engine.pause(&mallory), Err(Error::Unauthorized { .. })));
        assert!(matches!(engine.run_maintenance(&mallory), Err(Error::Unauthorized { .. })));

        engine.grant_role(&admin(), mallory, Capability::Keeper).unwrap();
        assert!(engine.run_maintenance(&mallory).is_ok());
    }

    #[test]
    fn test_update_parameter_propagates_to_components() {
        let mut engine = engine_with(quiet_config());
        let change = engine
            .update_parameter(&admin(), ProtocolParameter::MaxSlippage, 800)
            .unwrap();
        assert_eq!(change.old_value, 500);
        assert_eq!(engine.state().pmm.config().max_slippage_bps, 800);
        assert_eq!(engine.config().trading.max_slippage_bps, 800);

        let events = engine.events().filter_by_type("ParameterChanged");
        assert_eq!(events.len(), 1);

        assert!(engine
            .update_parameter(&admin(), ProtocolParameter::MaxSlippage, 1_001)
            .is_err());
        assert_eq!(engine.config().trading.max_slippage_bps, 800);
    }

    #[test]
    fn test_block_cannot_go_backwards() {
        let mut engine = ProtocolEngine::new(ProtocolConfig::default(), AllowAll).unwrap();
        engine.begin_block(5, 100).unwrap();
        assert!(engine.begin_block(4, 200).is_err());
        assert!(engine.begin_block(6, 99).is_err());
        engine.begin_block(5, 100).unwrap();
    }

    #[test]
    fn test_end_block_drains_events() {
        let mut engine = engine_with(quiet_config());
        assert!(!engine.events().is_empty());
        let log = engine.end_block();
        assert!(log.filter_by_type("ConsensusUpdated").len() == 1);
        assert!(engine.events().is_empty());
    }
}
