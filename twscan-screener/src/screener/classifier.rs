//! Two-tier signal classification and ranking.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::breakout::BreakoutMetrics;
use super::config::ClassifierConfig;
use crate::data::DailyBar;

/// Confidence tier of a validated hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalTier {
    /// Close at or above MA20 with MA20 above MA60
    A,
    /// Every other validated hit
    B,
}

impl SignalTier {
    /// Tier from the close and its moving averages; missing averages give B.
    pub fn from_averages(close: f64, ma20: Option<f64>, ma60: Option<f64>) -> Self {
        match (ma20, ma60) {
            (Some(ma20), Some(ma60)) if close >= ma20 && ma20 > ma60 => Self::A,
            _ => Self::B,
        }
    }
}

impl std::fmt::Display for SignalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// An instrument that passed every validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateHit {
    pub code: String,
    pub name: String,
    pub change_pct: f64,
    pub volume_multiple: f64,
    pub lots: f64,
    pub body_ratio: f64,
    pub consolidation_range_pct: f64,
    pub breakout_pct: f64,
    pub close: f64,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub sector: String,
    pub is_main_sector: bool,
    pub tier: SignalTier,
}

impl CandidateHit {
    /// Assemble a hit from the day's bar and its breakout measurements.
    pub fn new(bar: &DailyBar, metrics: BreakoutMetrics, sector: &str, is_main_sector: bool) -> Self {
        Self {
            code: bar.code.clone(),
            name: bar.name.clone(),
            change_pct: bar.change_pct,
            volume_multiple: metrics.volume_multiple,
            lots: bar.lots(),
            body_ratio: bar.body_ratio().unwrap_or_default(),
            consolidation_range_pct: metrics.consolidation_range_pct,
            breakout_pct: metrics.breakout_pct,
            close: bar.close,
            ma20: metrics.ma_short,
            ma60: metrics.ma_long,
            sector: sector.to_string(),
            is_main_sector,
            tier: SignalTier::from_averages(bar.close, metrics.ma_short, metrics.ma_long),
        }
    }
}

/// Ranking order: main sector first, then change, then volume multiple.
///
/// Code breaks remaining ties so the order is total.
pub fn rank_order(a: &CandidateHit, b: &CandidateHit) -> Ordering {
    b.is_main_sector
        .cmp(&a.is_main_sector)
        .then_with(|| b.change_pct.total_cmp(&a.change_pct))
        .then_with(|| b.volume_multiple.total_cmp(&a.volume_multiple))
        .then_with(|| a.code.cmp(&b.code))
}

/// Hits split by tier, each ranked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifiedHits {
    pub tier_a: Vec<CandidateHit>,
    pub tier_b: Vec<CandidateHit>,
}

impl ClassifiedHits {
    /// All hits, tier A first.
    pub fn all(&self) -> impl Iterator<Item = &CandidateHit> {
        self.tier_a.iter().chain(self.tier_b.iter())
    }

    pub fn len(&self) -> usize {
        self.tier_a.len() + self.tier_b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct SignalClassifier {
    config: ClassifierConfig,
}

impl SignalClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Partition by tier and rank each tier.
    pub fn classify(&self, hits: Vec<CandidateHit>) -> ClassifiedHits {
        let (mut tier_a, mut tier_b): (Vec<_>, Vec<_>) =
            hits.into_iter().partition(|h| h.tier == SignalTier::A);
        tier_a.sort_by(rank_order);
        tier_b.sort_by(rank_order);
        ClassifiedHits { tier_a, tier_b }
    }

    /// The report view: each tier cut to the configured limit.
    pub fn report_view<'a>(&self, hits: &'a ClassifiedHits) -> (&'a [CandidateHit], &'a [CandidateHit]) {
        let limit = self.config.report_limit;
        (
            &hits.tier_a[..hits.tier_a.len().min(limit)],
            &hits.tier_b[..hits.tier_b.len().min(limit)],
        )
    }
}
