//! Volume surge and consolidation breakout validation.
//!
//! Runs per prefiltered candidate against its daily history. Sessions on or
//! after the signal date are dropped first so today's bar never leaks into
//! its own baseline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::BreakoutConfig;
use super::indicators::{max, min, ratio, sma};
use crate::data::{DailyBar, HistoricalBar};

/// Why a candidate failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Fewer sessions than the consolidation window plus margin
    InsufficientHistory,
    /// Baseline volume average is zero or undefined
    NoBaselineVolume,
    /// Today's volume is not enough above the baseline
    VolumeNotConfirmed,
    /// Box low is not positive
    InvalidRange,
    /// Box is wider than the consolidation limit
    RangeTooWide,
    /// Close did not clear the box high by the required margin
    NoBreakout,
    /// History could not be fetched
    HistoryUnavailable,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientHistory => "insufficient_history",
            Self::NoBaselineVolume => "no_baseline_volume",
            Self::VolumeNotConfirmed => "volume_not_confirmed",
            Self::InvalidRange => "invalid_range",
            Self::RangeTooWide => "range_too_wide",
            Self::NoBreakout => "no_breakout",
            Self::HistoryUnavailable => "history_unavailable",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurements of a confirmed breakout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutMetrics {
    /// Today's volume over the baseline average
    pub volume_multiple: f64,
    /// Close over the box high, minus one
    pub breakout_pct: f64,
    /// (box high - box low) / box low
    pub consolidation_range_pct: f64,
    /// Short close average from history, if long enough
    pub ma_short: Option<f64>,
    /// Long close average from history, if long enough
    pub ma_long: Option<f64>,
}

/// Per-candidate volume and breakout check.
pub struct VolumeBreakoutValidator {
    config: BreakoutConfig,
}

impl VolumeBreakoutValidator {
    pub fn new(config: BreakoutConfig) -> Self {
        Self { config }
    }

    /// Create with default thresholds.
    pub fn with_defaults() -> Self {
        Self::new(BreakoutConfig::default())
    }

    pub fn config(&self) -> &BreakoutConfig {
        &self.config
    }

    /// Validate `today` against `history`, ignoring sessions dated `as_of` or later.
    pub fn validate(
        &self,
        today: &DailyBar,
        history: &[HistoricalBar],
        as_of: NaiveDate,
    ) -> Result<BreakoutMetrics, RejectReason> {
        let past: Vec<&HistoricalBar> = history.iter().filter(|b| b.date < as_of).collect();
        if past.len() < self.config.min_sessions() {
            return Err(RejectReason::InsufficientHistory);
        }

        // Step 1: volume surge over the short baseline
        let volumes: Vec<f64> = past.iter().map(|b| b.volume).collect();
        let baseline = sma(&volumes, self.config.volume_ma_window)
            .filter(|v| *v > 0.0)
            .ok_or(RejectReason::NoBaselineVolume)?;
        let volume_multiple = ratio(today.volume, baseline).ok_or(RejectReason::NoBaselineVolume)?;
        if today.volume <= self.config.volume_multiple * baseline {
            return Err(RejectReason::VolumeNotConfirmed);
        }

        // Step 2: tight box, then a close above it
        let window = &past[past.len() - self.config.consolidation_window..];
        let highs: Vec<f64> = window.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = window.iter().map(|b| b.low).collect();
        let (Some(box_high), Some(box_low)) = (max(&highs), min(&lows)) else {
            return Err(RejectReason::InsufficientHistory);
        };

        let consolidation_range_pct =
            ratio(box_high - box_low, box_low).ok_or(RejectReason::InvalidRange)?;
        if consolidation_range_pct > self.config.max_range_pct {
            return Err(RejectReason::RangeTooWide);
        }

        if today.close < box_high * (1.0 + self.config.breakout_pct) {
            return Err(RejectReason::NoBreakout);
        }
        let breakout_pct = ratio(today.close, box_high)
            .map(|r| r - 1.0)
            .ok_or(RejectReason::InvalidRange)?;

        if self.config.require_volume_above_ma5 && today.volume <= baseline {
            return Err(RejectReason::VolumeNotConfirmed);
        }

        let closes: Vec<f64> = past.iter().map(|b| b.close).collect();
        Ok(BreakoutMetrics {
            volume_multiple,
            breakout_pct,
            consolidation_range_pct,
            ma_short: sma(&closes, self.config.ma_short),
            ma_long: sma(&closes, self.config.ma_long),
        })
    }
}
