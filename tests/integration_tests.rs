//! Integration tests for the PARITY protocol.
//!
//! These tests drive a full engine through mint, burn, swap and
//! maintenance flows and check the resulting balances.

use parity::core::asset::AssetPrices;
use parity::nav::RebalanceOutcome;
use parity::prelude::*;
use parity::protocol::MaintenanceReport;
use parity::reserve::SweepOutcome;
use parity::storage::FileStore;
use parity::trading::SlippageCurve;
use parity::utils::constants::{PRICE_PRECISION, WAD};

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

const STABLE: u128 = 1_000_000;
const KSM: u128 = 1_000_000_000_000;
const DOT: u128 = 10_000_000_000;

fn admin() -> Address {
    Address::from_label("admin")
}

fn user(label: &str) -> Address {
    Address::from_label(label)
}

/// KSM $20, DOT $5, stable $1; caps 150M / 7.5B give a $2 PARITY
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

fn quiet_config() -> ProtocolConfig {
    let mut config = ProtocolConfig::default();
    config.maintenance.auto_run = false;
    config
}

/// Engine at block 1 (t = 1000) with one reporter and fresh consensus
fn engine_with(config: ProtocolConfig) -> ProtocolEngine {
    let mut engine = ProtocolEngine::new(config, RoleRegistry::with_admin(admin())).unwrap();
    engine.begin_block(1, 1_000).unwrap();
    let reporter = user("reporter");
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

fn mint(engine: &mut ProtocolEngine, who: Address, asset: Asset, amount: u128) -> parity::protocol::MintResult {
    engine.credit_collateral(who, asset, amount).unwrap();
    engine
        .mint(MintOp {
            user: who,
            asset,
            amount,
            min_parity_out: 0,
            deadline: u64::MAX,
        })
        .unwrap()
}

fn burn_op(who: Address, parity_amount: u128, asset_out: Asset) -> BurnOp {
    BurnOp {
        user: who,
        parity_amount,
        asset_out,
        min_amount_out: 0,
        deadline: u64::MAX,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_bootstrap_consensus_equals_single_submission() {
    let engine = engine_with(quiet_config());
    let oracle = &engine.state().oracle;

    assert!(oracle.is_bootstrap());
    assert_eq!(oracle.quorum(), 1);
    let consensus = oracle.consensus();
    assert_eq!(
        consensus.prices,
        AssetPrices {
            ksm: 20 * PRICE_PRECISION,
            dot: 5 * PRICE_PRECISION,
            stable: PRICE_PRECISION,
        }
    );
    assert_eq!(consensus.confidence, 90);
    assert_eq!(oracle.parity_price(1_000).unwrap(), 2 * PRICE_PRECISION);
}

#[test]
fn test_bootstrap_completes_at_full_quorum() {
    let mut engine = ProtocolEngine::new(quiet_config(), RoleRegistry::with_admin(admin())).unwrap();
    engine.begin_block(1, 1_000).unwrap();

    let reporters = [(user("r1"), 10, 20), (user("r2"), 10, 22), (user("r3"), 20, 21)];
    for (reporter, weight, _) in reporters {
        engine.add_reporter(&admin(), reporter, weight).unwrap();
    }

    let mut results = Vec::new();
    for (reporter, _, ksm) in reporters {
        results.push(
            engine
                .submit_price(SubmitPriceOp {
                    reporter,
                    submission: PriceSubmission {
                        ksm_price: ksm * PRICE_PRECISION,
                        ..submission()
                    },
                    deadline: 1_000,
                })
                .unwrap(),
        );
    }

    assert!(results.iter().all(|r| r.consensus_updated));
    assert_eq!(results[1].quorum, 2);
    assert!(results[2].bootstrap_completed);
    assert_eq!(results[2].quorum, 3);

    let oracle = &engine.state().oracle;
    assert!(!oracle.is_bootstrap());
    // (20*10 + 22*10 + 21*20) / 40
    assert_eq!(oracle.consensus().prices.ksm, 21 * PRICE_PRECISION);
    assert_eq!(engine.events().filter_by_type("BootstrapCompleted").len(), 1);
}

#[test]
fn test_unknown_reporter_rejected_without_events() {
    let mut engine = engine_with(quiet_config());
    let events_before = engine.events().len();
    let err = engine
        .submit_price(SubmitPriceOp {
            reporter: user("stranger"),
            submission: submission(),
            deadline: 1_000,
        })
        .unwrap_err();
    assert!(matches!(err, Error::UnknownReporter(_)));
    assert_eq!(engine.events().len(), events_before);
}

#[test]
fn test_freshness_boundary() {
    let mut engine = engine_with(quiet_config());
    engine.credit_collateral(user("alice"), Asset::Stable, 10 * STABLE).unwrap();
    let op = MintOp {
        user: user("alice"),
        asset: Asset::Stable,
        amount: STABLE,
        min_parity_out: 0,
        deadline: u64::MAX,
    };

    // Exactly at the threshold: fresh
    engine.begin_block(2, 1_300).unwrap();
    engine.mint(op.clone()).unwrap();

    // One second past: every price-dependent entry point is closed
    engine.begin_block(3, 1_301).unwrap();
    let stale = Error::StalePrice { age: 301, max_age: 300 };
    assert_eq!(engine.mint(op), Err(stale.clone()));
    assert_eq!(engine.burn(burn_op(user("alice"), WAD / 10, Asset::Stable)), Err(stale.clone()));
    assert_eq!(engine.quote_swap(Asset::Stable, STABLE, Asset::Ksm), Err(stale));
    assert_eq!(engine.statistics().parity_price, None);
}

// ═══════════════════════════════════════════════════════════════════════════════
// MINT AND BURN
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_mint_with_stable_at_two_dollars() {
    let mut engine = engine_with(quiet_config());
    let alice = user("alice");
    let result = mint(&mut engine, alice, Asset::Stable, 1_000 * STABLE);

    // 1000 / 2 * (1 - 0.003)
    assert_eq!(result.parity_minted, 4_985 * WAD / 10);
    assert_eq!(result.nav_amount, 100 * STABLE);
    assert_eq!(result.reserve_amount, 900 * STABLE);

    let stats = engine.statistics();
    assert_eq!(stats.total_supply, 500 * WAD);
    assert_eq!(stats.nav_holdings.stable, 100 * STABLE);
    assert_eq!(stats.reserve_balances.stable, 900 * STABLE);
    assert_eq!(engine.events().filter_by_type("Minted").len(), 1);
    assert_eq!(engine.events().filter_by_type("NavContributed").len(), 1);
    engine.verify_invariants().unwrap();
}

#[test]
fn test_burn_at_baseline_contributes_base_rate() {
    let mut engine = engine_with(quiet_config());
    let alice = user("alice");
    mint(&mut engine, alice, Asset::Stable, 1_000 * STABLE);

    // Supply still equals alice's baseline, so growth is exactly 1.0
    let result = engine.burn(burn_op(alice, 100 * WAD, Asset::Stable)).unwrap();

    assert_eq!(result.fee_parity, 3 * WAD / 10);
    assert_eq!(result.parity_burned, 997 * WAD / 10);
    assert_eq!(result.base_usd, 1_994 * WAD / 10);
    assert_eq!(result.policy_bps, 1_000);
    assert_eq!(result.nav_contribution.stable, 19_940_000);
    assert_eq!(result.reserve_payout.stable, 179_460_000);
    assert!(result.nav_payout.is_empty());

    let state = engine.state();
    assert_eq!(state.nav.holdings().stable, 100 * STABLE + 19_940_000);
    assert_eq!(state.reserve.balance(Asset::Stable), 900 * STABLE - 199_400_000);
    assert_eq!(state.collateral.balance(&alice, Asset::Stable), 179_460_000);
    engine.verify_invariants().unwrap();
}

#[test]
fn test_burn_after_tripled_supply_pays_premium() {
    let mut engine = engine_with(quiet_config());
    let bob = user("bob");
    mint(&mut engine, bob, Asset::Stable, 1_000 * STABLE);
    mint(&mut engine, user("carol"), Asset::Stable, 2_000 * STABLE);
    assert_eq!(engine.state().token.total_supply().raw(), 1_500 * WAD);

    let result = engine.burn(burn_op(bob, 100 * WAD, Asset::Stable)).unwrap();

    // g = 3: premium = base rate * (3 - 2), within the 1000 bps cap
    assert_eq!(result.policy_bps, -1_000);
    assert!(result.nav_contribution.is_empty());
    assert_eq!(result.reserve_payout.stable, 199_400_000);
    assert_eq!(result.nav_payout.stable, 19_940_000);
    assert_eq!(result.total_payout.stable, 219_340_000);
    assert_eq!(engine.state().nav.holdings().stable, 300 * STABLE - 19_940_000);
    assert_eq!(engine.events().filter_by_type("NavDistributed").len(), 1);
}

#[test]
fn test_premium_capped_by_max_premium() {
    let mut engine = engine_with(quiet_config());
    engine
        .update_parameter(&admin(), ProtocolParameter::PolicyMaxPremium, 400)
        .unwrap();
    let bob = user("bob");
    mint(&mut engine, bob, Asset::Stable, 1_000 * STABLE);
    mint(&mut engine, user("carol"), Asset::Stable, 2_000 * STABLE);

    let result = engine.burn(burn_op(bob, 100 * WAD, Asset::Stable)).unwrap();
    assert_eq!(result.policy_bps, -400);
    assert_eq!(result.nav_payout.stable, 7_976_000);
}

#[test]
fn test_round_trip_loses_only_fees() {
    let mut config = quiet_config();
    config.nav.contribution_bps = 0;
    config.policy.base_rate_bps = 0;
    config.policy.min_contribution_bps = 0;
    let mut engine = engine_with(config);
    let alice = user("alice");

    let minted = mint(&mut engine, alice, Asset::Stable, 1_000 * STABLE);
    let burned = engine
        .burn(burn_op(alice, minted.parity_minted, Asset::Stable))
        .unwrap();

    // 1000 * (1 - 0.003) * (1 - 0.003)
    assert_eq!(burned.total_payout.stable, 994_009_000);
    assert!(!burned.final_burn);
    assert_eq!(engine.state().token.balance_of(&alice).raw(), 0);
}

#[test]
fn test_multi_burn_without_stable_uses_ksm_and_dot() {
    let mut engine = engine_with(quiet_config());
    let alice = user("alice");
    mint(&mut engine, alice, Asset::Ksm, 100 * KSM);
    mint(&mut engine, user("bob"), Asset::Dot, 400 * DOT);

    let reserve = engine.state().reserve.balances();
    assert_eq!(reserve.stable, 0);
    assert_eq!((reserve.ksm, reserve.dot), (90 * KSM, 360 * DOT));

    let result = engine
        .multi_burn(MultiBurnOp {
            user: alice,
            parity_amount: 100 * WAD,
            min_amounts_out: AssetBalances::ZERO,
            deadline: u64::MAX,
        })
        .unwrap();

    // $199.40 split evenly between $1800 of KSM and $1800 of DOT
    assert_eq!(result.reserve_payout.stable, 0);
    assert_eq!(result.reserve_payout.ksm, 4_985 * KSM / 1_000);
    assert_eq!(result.reserve_payout.dot, 1_994 * DOT / 100);
    engine.verify_invariants().unwrap();
}

#[test]
fn test_multi_burn_beyond_liquidity_is_atomic() {
    let mut engine = engine_with(quiet_config());
    let alice = user("alice");
    mint(&mut engine, alice, Asset::Stable, 1_000 * STABLE);
    // Drain most of the reserve through a second holder
    engine
        .transfer(TransferOp {
            from: alice,
            to: user("bob"),
            amount: 100 * WAD,
            deadline: u64::MAX,
        })
        .unwrap();
    engine.burn(burn_op(user("bob"), 100 * WAD, Asset::Stable)).unwrap();

    let before = engine.state().clone();
    let events_before = engine.events().len();
    let err = engine
        .multi_burn(MultiBurnOp {
            user: alice,
            parity_amount: 3_985 * WAD / 10,
            min_amounts_out: AssetBalances::ZERO,
            deadline: u64::MAX,
        })
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientLiquidity { .. }));
    assert_eq!(engine.state(), &before);
    assert_eq!(engine.events().len(), events_before);
}

#[test]
fn test_final_burn_unwinds_reserve_and_pool() {
    let mut config = quiet_config();
    config.fees.mint_fee_bps = 0;
    config.fees.burn_fee_bps = 0;
    let mut engine = engine_with(config);
    let alice = user("alice");

    let minted = mint(&mut engine, alice, Asset::Stable, 1_000 * STABLE);
    assert_eq!(minted.parity_minted, 500 * WAD);
    assert_eq!(engine.state().token.total_supply().raw(), 500 * WAD);

    let result = engine.burn(burn_op(alice, 500 * WAD, Asset::Stable)).unwrap();

    // $900 from the reserve, the $100 pool as premium
    assert!(result.final_burn);
    assert_eq!(result.reserve_payout.stable, 900 * STABLE);
    assert_eq!(result.nav_payout.stable, 100 * STABLE);
    assert_eq!(result.total_payout.stable, 1_000 * STABLE);
    assert_eq!(engine.state().reserve.balances(), &AssetBalances::ZERO);
    assert_eq!(engine.state().nav.holdings(), &AssetBalances::ZERO);
    assert_eq!(engine.state().token.total_supply().raw(), 0);
    assert_eq!(engine.state().collateral.balance(&alice, Asset::Stable), 1_000 * STABLE);
    assert!(engine.verify_invariants().is_ok());
}

#[test]
fn test_large_redemption_needs_reserve_cover() {
    let mut engine = engine_with(quiet_config());
    let alice = user("alice");
    let minted = mint(&mut engine, alice, Asset::Stable, 1_000 * STABLE);

    // The fee sink still holds PARITY, so this is not a final burn; payout
    // plus contribution exceed the 90% the reserve kept
    let before = engine.state().clone();
    let err = engine
        .burn(burn_op(alice, minted.parity_minted, Asset::Stable))
        .unwrap_err();
    assert_eq!(
        err,
        Error::InsufficientReserve {
            asset: "STABLE".into(),
            required: 994_009_000,
            available: 900 * STABLE,
        }
    );
    assert_eq!(engine.state(), &before);

    // Protocol-owned liquidity covers the gap
    engine.credit_collateral(admin(), Asset::Stable, 100 * STABLE).unwrap();
    engine.deposit_reserve(&admin(), Asset::Stable, 100 * STABLE).unwrap();
    let result = engine
        .burn(burn_op(alice, minted.parity_minted, Asset::Stable))
        .unwrap();
    assert!(!result.final_burn);
    assert_eq!(result.reserve_payout.stable + result.nav_contribution.stable, 994_009_000);
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRADING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_slippage_curve_quadratic_term() {
    let uncapped = SlippageCurve {
        base_bps: 10,
        max_bps: u64::MAX,
    };
    // Half the reserve: 0.5^2 * 10000
    assert_eq!(uncapped.slippage_bps(500, 1_000), 2_510);
    assert_eq!(SlippageCurve::default().slippage_bps(500, 1_000), 500);
}

#[test]
fn test_large_swap_clamped_to_max_slippage() {
    let mut engine = engine_with(quiet_config());
    mint(&mut engine, user("alice"), Asset::Stable, 1_000 * STABLE);
    engine.credit_collateral(admin(), Asset::Ksm, 100 * KSM).unwrap();
    engine.deposit_reserve(&admin(), Asset::Ksm, 100 * KSM).unwrap();

    let dave = user("dave");
    engine.credit_collateral(dave, Asset::Ksm, 30 * KSM).unwrap();
    let quote = engine.quote_swap(Asset::Ksm, 30 * KSM, Asset::Stable).unwrap();
    assert_eq!(quote.gross_output, 600 * STABLE);
    assert_eq!(quote.slippage_bps, 500);

    let result = engine
        .swap(SwapOp {
            user: dave,
            asset_in: Asset::Ksm,
            amount_in: 30 * KSM,
            asset_out: Asset::Stable,
            min_amount_out: 0,
            deadline: u64::MAX,
        })
        .unwrap();
    // 600 - 5% slippage - 0.3% fee
    assert_eq!(result.quote.output_amount, 568_200_000);
    assert!(result.anomalous);
    assert_eq!(engine.state().collateral.balance(&dave, Asset::Stable), 568_200_000);
    assert_eq!(engine.events().filter_by_type("SlippageAnomaly").len(), 1);
}

#[test]
fn test_failed_swap_leaves_state_untouched() {
    let mut engine = engine_with(quiet_config());
    mint(&mut engine, user("alice"), Asset::Stable, 1_000 * STABLE);
    let dave = user("dave");
    engine.credit_collateral(dave, Asset::Ksm, KSM).unwrap();

    // The reserve sits at 90% and cannot trade
    let before = engine.state().clone();
    let events_before = engine.events().len();
    let err = engine
        .swap(SwapOp {
            user: dave,
            asset_in: Asset::Ksm,
            amount_in: KSM,
            asset_out: Asset::Stable,
            min_amount_out: 0,
            deadline: u64::MAX,
        })
        .unwrap_err();
    assert!(matches!(err, Error::CollateralRatioTooLow { .. }));
    assert_eq!(engine.state(), &before);
    assert_eq!(engine.events().len(), events_before);
    assert!(engine.state().pmm.escrow().is_empty());
    assert!(engine.locks().held().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAINTENANCE
// ═══════════════════════════════════════════════════════════════════════════════

fn funded_engine() -> ProtocolEngine {
    let mut engine = engine_with(quiet_config());
    mint(&mut engine, user("alice"), Asset::Stable, 1_000 * STABLE);
    engine.credit_collateral(admin(), Asset::Ksm, 100 * KSM).unwrap();
    engine.credit_collateral(admin(), Asset::Dot, 400 * DOT).unwrap();
    engine.deposit_reserve(&admin(), Asset::Ksm, 100 * KSM).unwrap();
    engine.deposit_reserve(&admin(), Asset::Dot, 400 * DOT).unwrap();
    engine
}

#[test]
fn test_maintenance_is_idempotent() {
    let mut engine = funded_engine();

    let first = engine.run_maintenance(&admin()).unwrap();
    assert!(matches!(first.rebalance, Ok(RebalanceOutcome::Rebalanced { .. })));
    assert!(matches!(first.sweep, Ok(SweepOutcome::Swept { .. })));
    assert!(first.changed_state());

    let before = engine.state().clone();
    let events_before = engine.events().len();
    let second: MaintenanceReport = engine.run_maintenance(&admin()).unwrap();
    assert!(matches!(second.rebalance, Ok(RebalanceOutcome::NotDue { .. })));
    assert!(matches!(second.sweep, Ok(SweepOutcome::NotDue { .. })));
    assert!(!second.changed_state());
    assert_eq!(engine.state(), &before);
    assert_eq!(engine.events().len(), events_before);
}

#[test]
fn test_sweep_keeps_minimum_ratio() {
    let mut engine = funded_engine();
    engine.run_maintenance(&admin()).unwrap();

    let stats = engine.statistics();
    assert!(stats.collateral_ratio_bps.unwrap() >= 11_000);
    assert_eq!(stats.sweep_count, 1);
    let sink = engine.config().sweep.sink;
    assert!(!engine.state().collateral.balances_of(&sink).is_empty());
}

#[test]
fn test_failed_rebalance_does_not_revert_mint() {
    // auto_run is on by default; the under-collateralized reserve cannot trade
    let mut engine = engine_with(ProtocolConfig::default());
    let result = mint(&mut engine, user("alice"), Asset::Stable, 1_000 * STABLE);
    assert_eq!(result.parity_minted, 4_985 * WAD / 10);

    let failures = engine.events().filter_by_type("MaintenanceFailed");
    assert_eq!(failures.len(), 1);
    match failures[0] {
        ProtocolEvent::MaintenanceFailed(e) => assert_eq!(e.task, "rebalance"),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(engine.state().nav.holdings().stable, 100 * STABLE);
    assert_eq!(engine.state().token.balance_of(&user("alice")).raw(), 4_985 * WAD / 10);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_engine_state_survives_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut engine = engine_with(quiet_config());
    mint(&mut engine, user("alice"), Asset::Dot, 40 * DOT);
    let stats = engine.statistics();
    let events = engine.end_block();

    {
        let manager = StateManager::new(FileStore::open(temp_dir.path()).unwrap());
        manager.save_block_events(1, &events).unwrap();
        manager.save_state(engine.state()).unwrap();
    }

    let manager = StateManager::new(FileStore::open(temp_dir.path()).unwrap());
    let state = manager.load_state().unwrap().unwrap();
    let restored = ProtocolEngine::from_state(state, AllowAll);
    assert_eq!(restored.statistics(), stats);
    assert_eq!(manager.load_all_events().unwrap().len(), events.len());
    restored.verify_invariants().unwrap();
}
