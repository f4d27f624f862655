//! Weighted multi-reporter price consensus.
//!
//! Up to five weighted reporters push [`PriceSubmission`]s. Every accepted
//! submission is stored as that reporter's record and triggers a
//! recomputation over the reporters whose records are still fresh.
//!
//! ## Bootstrap
//!
//! The quorum starts at one live reporter and follows the live count
//! upwards. Once `full_quorum` live reporters are seen at the same time,
//! bootstrap ends for good and the quorum stays at `full_quorum`. The
//! quorum never decreases.
//!
//! ## Failing closed
//!
//! When the quorum is not met the previous consensus record is kept
//! untouched. It ages out after the freshness window, after which every
//! price-dependent operation is rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::core::asset::{Asset, AssetPrices};
use crate::core::config::OracleConfig;
use crate::error::{Error, Result};
use crate::oracle::price_record::{PriceHistory, PriceRecord, PriceSubmission};
use crate::utils::constants::{MAX_REPORTER_WEIGHT, MIN_REPORTER_WEIGHT};
use crate::utils::crypto::Address;
use crate::utils::math::{mul_div, weighted_average, FixedPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTER
// ═══════════════════════════════════════════════════════════════════════════════

/// A registered price reporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    /// Reporter account
    pub address: Address,
    /// Aggregation weight, 1 to 100
    pub weight: u32,
    /// Last accepted submission
    pub record: Option<PriceRecord>,
}

impl Reporter {
    fn validate_weight(weight: u32) -> Result<()> {
        if !(MIN_REPORTER_WEIGHT..=MAX_REPORTER_WEIGHT).contains(&weight) {
            return Err(Error::ParameterOutOfBounds {
                name: "reporter_weight".into(),
                value: weight as u128,
                min: MIN_REPORTER_WEIGHT as u128,
                max: MAX_REPORTER_WEIGHT as u128,
            });
        }
        Ok(())
    }

    fn fresh_record(&self, now: u64, max_age: u64) -> Option<&PriceRecord> {
        self.record.as_ref().filter(|r| r.is_fresh(now, max_age))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a consensus recomputation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusOutcome {
    /// A new consensus record was produced
    Updated {
        /// The new record
        record: PriceRecord,
        /// Reporters that contributed
        live_reporters: usize,
    },
    /// Not enough live reporters; previous record kept
    QuorumNotMet {
        /// Reporters with fresh records
        live_reporters: usize,
        /// Required quorum
        quorum: usize,
    },
}

/// Result of a price submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Record stored for the reporter
    pub reporter_record: PriceRecord,
    /// What happened to the consensus
    pub consensus: ConsensusOutcome,
    /// True if this submission ended bootstrap mode
    pub bootstrap_completed: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSENSUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Consensus over weighted reporter submissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConsensus {
    config: OracleConfig,
    reporters: BTreeMap<Address, Reporter>,
    consensus: PriceRecord,
    history: PriceHistory,
    bootstrap: bool,
    quorum: usize,
}

impl OracleConsensus {
    /// Create an oracle with no reporters, in bootstrap mode
    pub fn new(config: OracleConfig) -> Self {
        let history = PriceHistory::new(config.history_size);
        Self {
            config,
            reporters: BTreeMap::new(),
            consensus: PriceRecord::default(),
            history,
            bootstrap: true,
            quorum: 1,
        }
    }

    /// Oracle parameters
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Replace the oracle parameters. Outside bootstrap the quorum follows
    /// `full_quorum`.
    pub(crate) fn set_config(&mut self, config: OracleConfig) {
        if !self.bootstrap {
            self.quorum = config.full_quorum;
        }
        self.config = config;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REPORTER REGISTRY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a reporter
    pub fn add_reporter(&mut self, address: Address, weight: u32) -> Result<()> {
        if address.is_zero() {
            return Err(Error::ZeroAddress);
        }
        Reporter::validate_weight(weight)?;
        if self.reporters.contains_key(&address) {
            return Err(Error::ReporterExists(address.to_hex()));
        }
        if self.reporters.len() >= self.config.max_reporters {
            return Err(Error::ReporterLimitReached {
                max: self.config.max_reporters,
            });
        }
        self.reporters.insert(
            address,
            Reporter {
                address,
                weight,
                record: None,
            },
        );
        Ok(())
    }

    /// Remove a reporter and its record
    pub fn remove_reporter(&mut self, address: &Address) -> Result<Reporter> {
        self.reporters
            .remove(address)
            .ok_or_else(|| Error::UnknownReporter(address.to_hex()))
    }

    /// Change a reporter's weight
    pub fn set_reporter_weight(&mut self, address: &Address, weight: u32) -> Result<()> {
        Reporter::validate_weight(weight)?;
        let reporter = self
            .reporters
            .get_mut(address)
            .ok_or_else(|| Error::UnknownReporter(address.to_hex()))?;
        reporter.weight = weight;
        Ok(())
    }

    /// Registered reporters
    pub fn reporters(&self) -> impl Iterator<Item = &Reporter> {
        self.reporters.values()
    }

    /// Last record submitted by a reporter
    pub fn reporter_record(&self, address: &Address) -> Option<&PriceRecord> {
        self.reporters.get(address).and_then(|r| r.record.as_ref())
    }

    /// Reporters whose records are fresh at `now`
    pub fn live_reporter_count(&self, now: u64) -> usize {
        self.reporters
            .values()
            .filter(|r| r.fresh_record(now, self.config.freshness_secs).is_some())
            .count()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUBMISSION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Accept a reporter's submission and recompute consensus
    pub fn submit_price(
        &mut self,
        reporter: &Address,
        submission: PriceSubmission,
        now: u64,
    ) -> Result<SubmissionOutcome> {
        submission.validate(self.config.peg_tolerance_bps)?;
        let record = PriceRecord::from_submission(&submission, now)?;

        let entry = self
            .reporters
            .get_mut(reporter)
            .ok_or_else(|| Error::UnknownReporter(reporter.to_hex()))?;
        entry.record = Some(record);

        let was_bootstrap = self.bootstrap;
        let consensus = self.recompute(now)?;

        Ok(SubmissionOutcome {
            reporter_record: record,
            consensus,
            bootstrap_completed: was_bootstrap && !self.bootstrap,
        })
    }

    /// Recompute consensus from every fresh reporter record
    pub fn recompute(&mut self, now: u64) -> Result<ConsensusOutcome> {
        let max_age = self.config.freshness_secs;
        let live: Vec<(u128, &PriceRecord)> = self
            .reporters
            .values()
            .filter_map(|r| r.fresh_record(now, max_age).map(|rec| (r.weight as u128, rec)))
            .collect();
        let live_reporters = live.len();

        if self.bootstrap {
            if live_reporters >= self.config.full_quorum {
                self.bootstrap = false;
                self.quorum = self.config.full_quorum;
                debug!(quorum = self.quorum, "Oracle bootstrap complete");
            } else if live_reporters > self.quorum {
                self.quorum = live_reporters;
            }
        }

        if live_reporters == 0 || live_reporters < self.quorum {
            warn!(live_reporters, quorum = self.quorum, "Oracle quorum not met, keeping previous consensus");
            return Ok(ConsensusOutcome::QuorumNotMet {
                live_reporters,
                quorum: self.quorum,
            });
        }

        let average = |f: fn(&PriceRecord) -> u128| -> Result<u128> {
            weighted_average(live.iter().map(|(w, rec)| (f(rec), *w)))?.ok_or(Error::NoConsensus)
        };

        let prices = AssetPrices {
            ksm: average(|r| r.prices.ksm as u128)? as u64,
            dot: average(|r| r.prices.dot as u128)? as u64,
            stable: average(|r| r.prices.stable as u128)? as u64,
        };
        let ksm_market_cap = average(|r| r.ksm_market_cap)?;
        let dot_market_cap = average(|r| r.dot_market_cap)?;
        let confidence = average(|r| r.confidence as u128)? as u8;

        let record = PriceRecord {
            prices,
            ksm_market_cap,
            dot_market_cap,
            consensus_ratio: FixedPoint::from_ratio(ksm_market_cap, dot_market_cap)?,
            timestamp: now,
            confidence,
            valid: true,
        };

        debug!(
            live_reporters,
            ksm = prices.ksm,
            dot = prices.dot,
            stable = prices.stable,
            ratio = %record.consensus_ratio,
            "Oracle consensus updated"
        );

        self.consensus = record;
        self.history.push(record);
        Ok(ConsensusOutcome::Updated {
            record,
            live_reporters,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current consensus record, fresh or not
    pub fn consensus(&self) -> &PriceRecord {
        &self.consensus
    }

    /// Whether the consensus record is valid and within the freshness window
    pub fn is_data_fresh(&self, now: u64) -> bool {
        self.consensus.is_fresh(now, self.config.freshness_secs)
    }

    /// Fresh consensus record or the reason it is unusable
    pub fn require_fresh(&self, now: u64) -> Result<&PriceRecord> {
        if !self.consensus.valid {
            return Err(Error::NoConsensus);
        }
        let age = self.consensus.age(now);
        if age > self.config.freshness_secs {
            return Err(Error::StalePrice {
                age,
                max_age: self.config.freshness_secs,
            });
        }
        Ok(&self.consensus)
    }

    /// Fresh consensus prices
    pub fn prices(&self, now: u64) -> Result<AssetPrices> {
        self.require_fresh(now).map(|r| r.prices)
    }

    /// PARITY reference price (8 decimals): market-cap ratio times the configured multiplier
    pub fn parity_price(&self, now: u64) -> Result<u64> {
        let record = self.require_fresh(now)?;
        let price = mul_div(
            record.consensus_ratio.raw(),
            self.config.parity_price_multiplier as u128,
            FixedPoint::SCALE,
        )?;
        if price == 0 {
            return Err(Error::InvalidParameter {
                name: "parity_price".into(),
                reason: "consensus ratio rounds to a zero price".into(),
            });
        }
        u64::try_from(price).map_err(|_| Error::Overflow {
            operation: "parity_price".into(),
        })
    }

    /// Whether bootstrap mode is still active
    pub fn is_bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Live reporters required for a consensus update
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Average consensus price of `asset` over the last `period_secs`
    pub fn twap(&self, asset: Asset, period_secs: u64, now: u64) -> Option<u64> {
        self.history.twap(asset, period_secs, now)
    }

    /// Consensus price change of `asset` between the last two updates
    pub fn price_change_bps(&self, asset: Asset) -> i64 {
        self.history.price_change_bps(asset)
    }

    /// Number of recorded consensus updates kept in history
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::PRICE_PRECISION;

    fn submission(ksm: u64, dot: u64) -> PriceSubmission {
        PriceSubmission {
            ksm_price: ksm * PRICE_PRECISION,
            dot_price: dot * PRICE_PRECISION,
            stable_price: PRICE_PRECISION,
            ksm_market_cap: 150_000_000,
            dot_market_cap: 7_500_000_000,
            confidence: 90,
        }
    }

    fn reporter(n: u8) -> Address {
        Address::from_label(&format!("reporter-{}", n))
    }

    fn oracle_with(n: u8) -> OracleConsensus {
        let mut oracle = OracleConsensus::new(OracleConfig::default());
        for i in 0..n {
            oracle.add_reporter(reporter(i), 50).unwrap();
        }
        oracle
    }

    #[test]
    fn test_single_reporter_bootstrap_consensus() {
        let mut oracle = oracle_with(1);
        let outcome = oracle.submit_price(&reporter(0), submission(20, 5), 1_000).unwrap();

        assert!(matches!(outcome.consensus, ConsensusOutcome::Updated { live_reporters: 1, .. }));
        let record = oracle.consensus();
        assert_eq!(record.prices, submission(20, 5).prices());
        assert_eq!(record.confidence, 90);
        assert_eq!(record.timestamp, 1_000);
        assert!(oracle.is_bootstrap());
        assert!(oracle.is_data_fresh(1_000));
    }

    #[test]
    fn test_weighted_average() {
        let mut oracle = OracleConsensus::new(OracleConfig::default());
        oracle.add_reporter(reporter(0), 75).unwrap();
        oracle.add_reporter(reporter(1), 25).unwrap();

        oracle.submit_price(&reporter(0), submission(20, 4), 1_000).unwrap();
        oracle.submit_price(&reporter(1), submission(24, 8), 1_010).unwrap();

        let record = oracle.consensus();
        assert_eq!(record.prices.ksm, 21 * PRICE_PRECISION);
        assert_eq!(record.prices.dot, 5 * PRICE_PRECISION);
        assert_eq!(oracle.quorum(), 2);
    }

    #[test]
    fn test_bootstrap_ends_at_three_live_reporters() {
        let mut oracle = oracle_with(4);
        oracle.submit_price(&reporter(0), submission(20, 5), 1_000).unwrap();
        assert_eq!(oracle.quorum(), 1);
        oracle.submit_price(&reporter(1), submission(20, 5), 1_001).unwrap();
        assert_eq!(oracle.quorum(), 2);
        let outcome = oracle.submit_price(&reporter(2), submission(20, 5), 1_002).unwrap();
        assert!(outcome.bootstrap_completed);
        assert!(!oracle.is_bootstrap());
        assert_eq!(oracle.quorum(), 3);

        // A fourth reporter does not raise the quorum further
        oracle.submit_price(&reporter(3), submission(20, 5), 1_003).unwrap();
        assert_eq!(oracle.quorum(), 3);
    }

    #[test]
    fn test_quorum_miss_keeps_previous_record() {
        let mut oracle = oracle_with(3);
        for i in 0..3 {
            oracle.submit_price(&reporter(i), submission(20, 5), 1_000).unwrap();
        }
        let before = *oracle.consensus();

        // Only one reporter is live after the others age out
        let outcome = oracle.submit_price(&reporter(0), submission(30, 5), 1_400).unwrap();
        assert_eq!(
            outcome.consensus,
            ConsensusOutcome::QuorumNotMet { live_reporters: 1, quorum: 3 }
        );
        assert_eq!(*oracle.consensus(), before);
        assert!(!oracle.is_data_fresh(1_400));
    }

    #[test]
    fn test_stale_records_excluded() {
        let mut oracle = oracle_with(2);
        oracle.submit_price(&reporter(0), submission(20, 5), 1_000).unwrap();
        oracle.submit_price(&reporter(1), submission(30, 5), 1_100).unwrap();
        assert_eq!(oracle.consensus().prices.ksm, 25 * PRICE_PRECISION);

        // Quorum rose to 2 during bootstrap and does not fall back
        let outcome = oracle.submit_price(&reporter(1), submission(40, 5), 1_301).unwrap();
        assert!(matches!(outcome.consensus, ConsensusOutcome::QuorumNotMet { .. }));
    }

    #[test]
    fn test_freshness_boundary() {
        let mut oracle = oracle_with(1);
        oracle.submit_price(&reporter(0), submission(20, 5), 1_000).unwrap();
        assert!(oracle.is_data_fresh(1_300));
        assert!(oracle.require_fresh(1_300).is_ok());
        assert!(!oracle.is_data_fresh(1_301));
        assert_eq!(
            oracle.require_fresh(1_301).unwrap_err(),
            Error::StalePrice { age: 301, max_age: 300 }
        );
    }

    #[test]
    fn test_no_consensus_before_first_submission() {
        let oracle = oracle_with(1);
        assert_eq!(oracle.require_fresh(0).unwrap_err(), Error::NoConsensus);
        assert!(oracle.parity_price(0).is_err());
    }

    #[test]
    fn test_parity_price_from_market_cap_ratio() {
        let mut oracle = oracle_with(1);
        oracle.submit_price(&reporter(0), submission(20, 5), 1_000).unwrap();
        // 150M / 7.5B = 0.02, times $100
        assert_eq!(oracle.parity_price(1_000).unwrap(), 2 * PRICE_PRECISION);
    }

    #[test]
    fn test_registry_rules() {
        let mut oracle = oracle_with(5);
        assert_eq!(
            oracle.add_reporter(reporter(9), 10),
            Err(Error::ReporterLimitReached { max: 5 })
        );
        assert!(matches!(oracle.add_reporter(reporter(0), 10), Err(Error::ReporterExists(_))));
        assert!(oracle.set_reporter_weight(&reporter(0), 0).is_err());
        assert!(oracle.set_reporter_weight(&reporter(0), 101).is_err());
        oracle.set_reporter_weight(&reporter(0), 100).unwrap();

        oracle.remove_reporter(&reporter(0)).unwrap();
        assert!(matches!(
            oracle.submit_price(&reporter(0), submission(20, 5), 1),
            Err(Error::UnknownReporter(_))
        ));
    }

    #[test]
    fn test_invalid_submission_leaves_state() {
        let mut oracle = oracle_with(1);
        let mut bad = submission(20, 5);
        bad.stable_price = 2 * PRICE_PRECISION;
        assert!(oracle.submit_price(&reporter(0), bad, 1_000).is_err());
        assert!(oracle.reporter_record(&reporter(0)).is_none());
        assert_eq!(oracle.history_len(), 0);
    }
}
