//! Sector rotation scoring.
//!
//! Each trading day, sectors are ranked by average open-to-close return plus a
//! weighted share of strongly rising members. A sector that lands in the
//! day's top N on enough of the recent trading days is a "main" sector.
//!
//! Trading days are found by walking calendar dates backward from the signal
//! day; a date is a trading day iff its snapshot has bars.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::SectorConfig;
use super::indicators::mean;
use crate::data::{sector_of, DailyBar, DailySnapshot, SectorMap, SnapshotProvider, UNKNOWN_SECTOR};

// ============================================================================
// Daily Scoring
// ============================================================================

/// One sector's aggregate for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDailyScore {
    pub sector: String,
    pub average_return_pct: f64,
    /// Fraction of members at or above the up threshold
    pub up_ratio: f64,
    pub member_count: usize,
    pub score: f64,
}

/// Rank the eligible sectors of one day, best first.
///
/// Sectors below the member minimum are left out. Equal scores are ordered
/// by sector label ascending.
pub fn score_sectors(
    bars: &[DailyBar],
    sectors: &SectorMap,
    config: &SectorConfig,
) -> Vec<SectorDailyScore> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for bar in bars {
        if let Some(ret) = bar.return_pct().filter(|r| r.is_finite()) {
            groups.entry(sector_of(sectors, &bar.code)).or_default().push(ret);
        }
    }

    let mut scores: Vec<SectorDailyScore> = groups
        .into_iter()
        .filter(|(_, returns)| returns.len() >= config.min_members)
        .filter_map(|(sector, returns)| {
            let average_return_pct = mean(&returns)?;
            let up = returns.iter().filter(|r| **r >= config.up_threshold_pct).count();
            let up_ratio = up as f64 / returns.len() as f64;
            Some(SectorDailyScore {
                sector: sector.to_string(),
                average_return_pct,
                up_ratio,
                member_count: returns.len(),
                score: average_return_pct + config.up_ratio_weight * up_ratio,
            })
        })
        .collect();

    scores.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.sector.cmp(&b.sector))
    });
    scores
}

/// Labels of the day's top N sectors.
pub fn top_sectors(bars: &[DailyBar], sectors: &SectorMap, config: &SectorConfig) -> Vec<String> {
    score_sectors(bars, sectors, config)
        .into_iter()
        .take(config.top_n)
        .map(|s| s.sector)
        .collect()
}

/// Sectors in at least `persistence` of the daily top lists.
///
/// "Unknown" takes part in the daily rankings but is never main.
pub fn main_sectors<'a, I>(daily_tops: I, persistence: usize) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for top in daily_tops {
        let unique: BTreeSet<&str> = top.iter().map(String::as_str).collect();
        for sector in unique {
            *counts.entry(sector).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(sector, count)| *count >= persistence && *sector != UNKNOWN_SECTOR)
        .map(|(sector, _)| sector.to_string())
        .collect()
}

// ============================================================================
// Calendar Walk
// ============================================================================

/// Calendar dates from `start` backward, at most `cap` of them.
#[derive(Debug, Clone)]
pub struct BackwardDays {
    next: NaiveDate,
    remaining: usize,
}

impl BackwardDays {
    pub fn new(start: NaiveDate, cap: usize) -> Self {
        Self {
            next: start,
            remaining: cap,
        }
    }
}

impl Iterator for BackwardDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.remaining -= 1;
        self.next = current - Duration::days(1);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

// ============================================================================
// Sector Context
// ============================================================================

/// Result of the multi-day replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectorContext {
    /// Main sector labels
    pub main_sectors: BTreeSet<String>,
    /// Resolved trading days, most recent first
    pub trading_days: Vec<NaiveDate>,
    /// Each trading day's top sectors, aligned with `trading_days`
    pub daily_tops: Vec<Vec<String>>,
    /// Calendar dates checked
    pub dates_checked: usize,
}

impl SectorContext {
    pub fn is_main(&self, sector: &str) -> bool {
        self.main_sectors.contains(sector)
    }

    /// Most recent trading day, or `fallback` if none was found.
    pub fn signal_date(&self, fallback: NaiveDate) -> NaiveDate {
        self.trading_days.first().copied().unwrap_or(fallback)
    }
}

/// Replays recent snapshots to find the main sectors.
pub struct SectorRotationScorer {
    config: SectorConfig,
    snapshots: Arc<dyn SnapshotProvider>,
}

impl SectorRotationScorer {
    pub fn new(config: SectorConfig, snapshots: Arc<dyn SnapshotProvider>) -> Self {
        Self { config, snapshots }
    }

    /// Walk back from `latest.date`, reusing `latest` for that day.
    ///
    /// Failed lookups count as non-trading days.
    pub async fn context(&self, latest: &DailySnapshot, sectors: &SectorMap) -> SectorContext {
        let mut context = SectorContext::default();

        for date in BackwardDays::new(latest.date, self.config.lookback_cap_days) {
            if context.trading_days.len() >= self.config.window_days {
                break;
            }
            context.dates_checked += 1;

            let top = if date == latest.date {
                latest
                    .is_trading_day()
                    .then(|| top_sectors(&latest.bars, sectors, &self.config))
            } else {
                match self.snapshots.fetch_daily_snapshot(Some(date)).await {
                    Ok(snapshot) if snapshot.is_trading_day() => {
                        Some(top_sectors(&snapshot.bars, sectors, &self.config))
                    }
                    Ok(_) => None,
                    Err(e) => {
                        warn!(date = %date, error = %e, "Snapshot lookup failed, treating as non-trading day");
                        None
                    }
                }
            };

            if let Some(top) = top {
                debug!(date = %date, top = ?top, "Sector ranking");
                context.trading_days.push(date);
                context.daily_tops.push(top);
            }
        }

        context.main_sectors = main_sectors(&context.daily_tops, self.config.persistence);
        info!(
            trading_days = context.trading_days.len(),
            dates_checked = context.dates_checked,
            main = ?context.main_sectors,
            "Sector rotation resolved"
        );
        context
    }
}
