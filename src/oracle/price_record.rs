//! Price submissions and price records.
//!
//! This module provides the value types of the oracle:
//! - Reporter submissions and their validation
//! - Timestamped price records (per reporter and consensus)
//! - Consensus history for TWAP and change tracking

use serde::{Deserialize, Serialize};

use crate::core::asset::{Asset, AssetPrices};
use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::math::FixedPoint;
use crate::utils::validation::{validate_confidence, validate_price, validate_stable_peg};

// ═══════════════════════════════════════════════════════════════════════════════
// SUBMISSION
// ═══════════════════════════════════════════════════════════════════════════════

/// One reporter's view of the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSubmission {
    /// KSM price (8 decimals)
    pub ksm_price: u64,
    /// DOT price (8 decimals)
    pub dot_price: u64,
    /// Stable asset price (8 decimals)
    pub stable_price: u64,
    /// KSM market capitalization in whole USD
    pub ksm_market_cap: u128,
    /// DOT market capitalization in whole USD
    pub dot_market_cap: u128,
    /// Reporter confidence, 0 to 100
    pub confidence: u8,
}

impl PriceSubmission {
    /// Validate prices, peg band and confidence
    pub fn validate(&self, peg_tolerance_bps: u64) -> Result<()> {
        validate_price("ksm_price", self.ksm_price)?;
        validate_price("dot_price", self.dot_price)?;
        validate_price("stable_price", self.stable_price)?;

        validate_stable_peg(self.stable_price, peg_tolerance_bps)?;

        if self.ksm_market_cap == 0 || self.dot_market_cap == 0 {
            return Err(Error::InvalidParameter {
                name: "market_cap".into(),
                reason: "market caps must be non-zero".into(),
            });
        }

        validate_confidence(self.confidence)
    }

    /// Prices as an [`AssetPrices`] set
    pub fn prices(&self) -> AssetPrices {
        AssetPrices {
            ksm: self.ksm_price,
            dot: self.dot_price,
            stable: self.stable_price,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// A timestamped price record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Per-asset prices (8 decimals)
    pub prices: AssetPrices,
    /// KSM market capitalization
    pub ksm_market_cap: u128,
    /// DOT market capitalization
    pub dot_market_cap: u128,
    /// KSM market cap over DOT market cap
    pub consensus_ratio: FixedPoint,
    /// Unix timestamp when the record was produced
    pub timestamp: u64,
    /// Confidence score (0-100)
    pub confidence: u8,
    /// False until a record has been produced
    pub valid: bool,
}

impl PriceRecord {
    /// Record built from a single submission
    pub fn from_submission(submission: &PriceSubmission, timestamp: u64) -> Result<Self> {
        Ok(Self {
            prices: submission.prices(),
            ksm_market_cap: submission.ksm_market_cap,
            dot_market_cap: submission.dot_market_cap,
            consensus_ratio: FixedPoint::from_ratio(
                submission.ksm_market_cap,
                submission.dot_market_cap,
            )?,
            timestamp,
            confidence: submission.confidence,
            valid: true,
        })
    }

    /// Price of one asset
    pub fn price(&self, asset: Asset) -> u64 {
        self.prices.get(asset)
    }

    /// Valid and no older than `max_age` (the boundary itself is fresh)
    pub fn is_fresh(&self, current_time: u64, max_age: u64) -> bool {
        self.valid && self.age(current_time) <= max_age
    }

    /// Get age of the record in seconds
    pub fn age(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.timestamp)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE HISTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded history of consensus records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistory {
    records: Vec<PriceRecord>,
    max_history: usize,
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(PRICE_HISTORY_SIZE)
    }
}

impl PriceHistory {
    /// Create with a capacity
    pub fn new(max_history: usize) -> Self {
        Self {
            records: Vec::new(),
            max_history: max_history.max(1),
        }
    }

    /// Append a record, dropping the oldest beyond capacity
    pub fn push(&mut self, record: PriceRecord) {
        self.records.push(record);
        if self.records.len() > self.max_history {
            self.records.remove(0);
        }
    }

    /// Most recent record
    pub fn latest(&self) -> Option<&PriceRecord> {
        self.records.last()
    }

    /// Record before the most recent one
    pub fn previous(&self) -> Option<&PriceRecord> {
        self.records.len().checked_sub(2).and_then(|i| self.records.get(i))
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Average price of `asset` over records newer than `period_secs`
    pub fn twap(&self, asset: Asset, period_secs: u64, current_time: u64) -> Option<u64> {
        let cutoff = current_time.saturating_sub(period_secs);
        let relevant: Vec<u128> = self
            .records
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .map(|r| r.price(asset) as u128)
            .collect();
        if relevant.is_empty() {
            return None;
        }
        let sum: u128 = relevant.iter().sum();
        Some((sum / relevant.len() as u128) as u64)
    }

    /// Change of `asset` between the last two records, in basis points
    pub fn price_change_bps(&self, asset: Asset) -> i64 {
        let (Some(current), Some(previous)) = (self.latest(), self.previous()) else {
            return 0;
        };
        let previous = previous.price(asset) as i128;
        if previous == 0 {
            return 0;
        }
        let current = current.price(asset) as i128;
        ((current - previous) * BPS_DIVISOR as i128 / previous) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> PriceSubmission {
        PriceSubmission {
            ksm_price: 20 * PRICE_PRECISION,
            dot_price: 5 * PRICE_PRECISION,
            stable_price: PRICE_PRECISION,
            ksm_market_cap: 300_000_000,
            dot_market_cap: 7_500_000_000,
            confidence: 90,
        }
    }

    #[test]
    fn test_submission_validation() {
        assert!(submission().validate(STABLE_PEG_TOLERANCE_BPS).is_ok());

        let mut off_peg = submission();
        off_peg.stable_price = 94_000_000;
        assert!(matches!(
            off_peg.validate(STABLE_PEG_TOLERANCE_BPS),
            Err(Error::PegDeviation { .. })
        ));

        let mut bad_confidence = submission();
        bad_confidence.confidence = 101;
        assert_eq!(
            bad_confidence.validate(STABLE_PEG_TOLERANCE_BPS),
            Err(Error::InvalidConfidence(101))
        );

        let mut zero_cap = submission();
        zero_cap.dot_market_cap = 0;
        assert!(zero_cap.validate(STABLE_PEG_TOLERANCE_BPS).is_err());
    }

    #[test]
    fn test_record_from_submission() {
        let record = PriceRecord::from_submission(&submission(), 1_000).unwrap();
        assert!(record.valid);
        assert_eq!(record.price(Asset::Ksm), 20 * PRICE_PRECISION);
        assert_eq!(record.consensus_ratio, FixedPoint::from_bps(400));
    }

    #[test]
    fn test_freshness_boundary() {
        let record = PriceRecord::from_submission(&submission(), 1_000).unwrap();
        assert!(record.is_fresh(1_300, 300));
        assert!(!record.is_fresh(1_301, 300));
        assert!(!PriceRecord::default().is_fresh(0, 300));
    }

    #[test]
    fn test_history_twap_and_change() {
        let mut history = PriceHistory::new(2);
        let mut record = PriceRecord::from_submission(&submission(), 100).unwrap();
        history.push(record);
        record.prices.ksm = 22 * PRICE_PRECISION;
        record.timestamp = 200;
        history.push(record);
        record.prices.ksm = 24 * PRICE_PRECISION;
        record.timestamp = 300;
        history.push(record);

        assert_eq!(history.len(), 2);
        assert_eq!(history.twap(Asset::Ksm, 1_000, 300), Some(23 * PRICE_PRECISION));
        assert_eq!(history.twap(Asset::Ksm, 50, 300), Some(24 * PRICE_PRECISION));
        // 22 -> 24 is +909 bps
        assert_eq!(history.price_change_bps(Asset::Ksm), 909);
        assert_eq!(history.price_change_bps(Asset::Stable), 0);
    }
}
