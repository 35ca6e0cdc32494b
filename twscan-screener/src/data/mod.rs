//! Market data module for TWSE listed equities.
//!
//! Defines the bar types the screener consumes and the collaborator traits
//! that supply them, plus concrete HTTP adapters.
//!
//! # Data Sources
//! - **TWSE OpenAPI / MI_INDEX**: full-market daily snapshots
//! - **Yahoo chart API**: per-instrument daily history (also the `^TWII` proxy)
//! - **TWSE company profile**: industry (sector) labels

mod http;
mod industry;
mod provider;
mod twse;
mod yahoo;

pub use http::HttpFetcher;
pub use industry::{industry_label, TwseSectorProvider};
pub use provider::{HistoryProvider, ProviderError, SectorInfoProvider, SnapshotProvider};
pub use twse::{parse_roc_date, TwseSnapshotProvider};
pub use yahoo::YahooHistoryProvider;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sector label used when no industry is known for an instrument.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Shares per lot (張), the quotation unit on TWSE.
pub const SHARES_PER_LOT: f64 = 1000.0;

// ============================================================================
// Snapshot Bars
// ============================================================================

/// One instrument's bar from the day's full-market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Stock code (e.g., "2330")
    pub code: String,
    /// Stock name (e.g., "台積電")
    pub name: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume in shares
    pub volume: f64,
    /// Percent change versus the previous close
    pub change_pct: f64,
}

impl DailyBar {
    /// Get the full range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check if this is a bullish candle
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Fraction of the high-low range occupied by the open-close body.
    ///
    /// `None` for flat or inverted bars, where the ratio is undefined.
    pub fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        if range > 0.0 && range.is_finite() {
            Some((self.close - self.open) / range)
        } else {
            None
        }
    }

    /// Traded volume in lots.
    pub fn lots(&self) -> f64 {
        self.volume / SHARES_PER_LOT
    }

    /// Intraday return from open to close in percent.
    ///
    /// `None` when the open is not positive.
    pub fn return_pct(&self) -> Option<f64> {
        if self.open > 0.0 {
            Some((self.close - self.open) / self.open * 100.0)
        } else {
            None
        }
    }
}

/// The full market for one calendar date.
///
/// An empty snapshot means the date was not a trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    /// Trading date the bars belong to
    pub date: NaiveDate,
    /// One bar per listed instrument
    pub bars: Vec<DailyBar>,
}

impl DailySnapshot {
    /// Create a snapshot for a non-trading day.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            bars: Vec::new(),
        }
    }

    /// A day is a trading day iff the snapshot carries any bars.
    pub fn is_trading_day(&self) -> bool {
        !self.bars.is_empty()
    }
}

// ============================================================================
// History Bars
// ============================================================================

/// One session of an instrument's daily history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Volume in shares
    pub volume: f64,
}

/// Sort ascending by date and drop duplicate dates, keeping the last seen.
pub fn normalize_history(mut bars: Vec<HistoricalBar>) -> Vec<HistoricalBar> {
    // stable sort keeps arrival order within a date, so the last one wins below
    bars.sort_by_key(|b| b.date);
    let mut out: Vec<HistoricalBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

// ============================================================================
// Sector Assignment
// ============================================================================

/// Mapping from instrument code to sector label.
pub type SectorMap = HashMap<String, String>;

/// Look up an instrument's sector, falling back to [`UNKNOWN_SECTOR`].
pub fn sector_of<'a>(sectors: &'a SectorMap, code: &str) -> &'a str {
    sectors
        .get(code)
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_SECTOR)
}

// ============================================================================
// Tests
// ============================================================================
