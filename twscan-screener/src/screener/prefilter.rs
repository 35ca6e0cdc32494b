//! Snapshot-only candle prefilter.
//!
//! Reduces the full market to strong bullish candles on heavy volume:
//! 1. Change: percent change at or above the minimum
//! 2. Shape: bullish body filling most of a non-zero range
//! 3. Liquidity: traded lots at or above the minimum

use serde::{Deserialize, Serialize};

use super::config::PrefilterConfig;
use crate::data::DailyBar;

// ============================================================================
// Filter Stage
// ============================================================================

/// Funnel stage identifier for tracking where instruments are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterStage {
    /// Full snapshot
    Input,
    /// Same-day candle shape
    Prefilter,
    /// Volume surge and consolidation breakout
    Breakout,
    /// Validated hits
    Final,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "輸入"),
            Self::Prefilter => write!(f, "長紅篩選"),
            Self::Breakout => write!(f, "爆量突破"),
            Self::Final => write!(f, "最終結果"),
        }
    }
}

// ============================================================================
// Filter Result
// ============================================================================

/// Result of a funnel stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResult {
    pub stage: FilterStage,
    /// Number of instruments that passed this stage
    pub passed: usize,
    /// Number eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

// ============================================================================
// Candidate Prefilter
// ============================================================================

/// Pure same-day filter over the snapshot.
pub struct CandidatePrefilter {
    config: PrefilterConfig,
}

impl CandidatePrefilter {
    pub fn new(config: PrefilterConfig) -> Self {
        Self { config }
    }

    /// Create with default thresholds.
    pub fn with_defaults() -> Self {
        Self::new(PrefilterConfig::default())
    }

    /// Keep the shape-qualifying bars. Output order follows the input.
    pub fn filter(&self, bars: &[DailyBar]) -> (Vec<DailyBar>, FilterResult) {
        let passed: Vec<DailyBar> = bars.iter().filter(|b| self.passes(b)).cloned().collect();
        let result = FilterResult::new(FilterStage::Prefilter, bars.len(), passed.len());
        (passed, result)
    }

    /// Check every prefilter condition for one bar.
    pub fn passes(&self, bar: &DailyBar) -> bool {
        if !(bar.change_pct.is_finite() && bar.change_pct >= self.config.min_change_pct) {
            return false;
        }

        if !bar.is_bullish() {
            return false;
        }

        // body_ratio is undefined (None) when high == low
        match bar.body_ratio() {
            Some(ratio) if ratio >= self.config.min_body_ratio => {}
            _ => return false,
        }

        bar.lots() >= self.config.min_lots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(code: &str, open: f64, high: f64, low: f64, close: f64, volume: f64, change_pct: f64) -> DailyBar {
        DailyBar {
            code: code.to_string(),
            name: format!("測試{}", code),
            open,
            high,
            low,
            close,
            volume,
            change_pct,
        }
    }

    #[test]
    fn test_reference_bar_passes() {
        let filter = CandidatePrefilter::with_defaults();
        let b = bar("2330", 100.0, 110.0, 98.0, 108.0, 2_000_000.0, 8.0);
        assert!(filter.passes(&b));
    }

    #[test]
    fn test_each_condition_rejects() {
        let filter = CandidatePrefilter::with_defaults();
        // change too small
        assert!(!filter.passes(&bar("1", 100.0, 110.0, 98.0, 108.0, 2_000_000.0, 3.4)));
        // bearish candle
        assert!(!filter.passes(&bar("2", 108.0, 110.0, 98.0, 100.0, 2_000_000.0, 8.0)));
        // long upper shadow: body 4 of range 12
        assert!(!filter.passes(&bar("3", 100.0, 110.0, 98.0, 104.0, 2_000_000.0, 8.0)));
        // thin volume: 1499 lots
        assert!(!filter.passes(&bar("4", 100.0, 110.0, 98.0, 108.0, 1_499_000.0, 8.0)));
        // zero range
        assert!(!filter.passes(&bar("5", 100.0, 100.0, 100.0, 100.0, 2_000_000.0, 8.0)));
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let filter = CandidatePrefilter::with_defaults();
        // change 3.5, body 6 of range 10, exactly 1500 lots
        let b = bar("6", 100.0, 106.0, 96.0, 106.0, 1_500_000.0, 3.5);
        assert_eq!(b.body_ratio(), Some(0.6));
        assert!(filter.passes(&b));
    }

    #[test]
    fn test_filter_reports_funnel() {
        let filter = CandidatePrefilter::with_defaults();
        let bars = vec![
            bar("2330", 100.0, 110.0, 98.0, 108.0, 2_000_000.0, 8.0),
            bar("2317", 100.0, 101.0, 99.0, 100.5, 2_000_000.0, 0.5),
            bar("2603", 50.0, 50.0, 50.0, 50.0, 10_000_000.0, 0.0),
            bar("2454", 900.0, 960.0, 895.0, 955.0, 3_000_000.0, 6.0),
        ];

        let (passed, result) = filter.filter(&bars);
        let codes: Vec<&str> = passed.iter().map(|b| b.code.as_str()).collect();
        assert_eq!(codes, vec!["2330", "2454"]);
        assert_eq!(result.stage, FilterStage::Prefilter);
        assert_eq!(result.passed, 2);
        assert_eq!(result.eliminated, 2);
        assert!((result.elimination_rate - 50.0).abs() < 1e-9);
        assert!(passed.iter().all(|b| b.high > b.low));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = CandidatePrefilter::with_defaults();
        let bars = vec![bar("2330", 100.0, 110.0, 98.0, 108.0, 2_000_000.0, 8.0)];
        let (first, _) = filter.filter(&bars);
        let (second, _) = filter.filter(&first);
        assert_eq!(first, second);
    }
}
