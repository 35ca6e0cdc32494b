//! Volume breakout screener.
//!
//! Scans the full TWSE market for strong bullish candles that break out of a
//! tight consolidation box on a volume surge, with sector rotation context.
//!
//! # Architecture
//!
//! ```text
//! snapshot ──▶ MarketRegimeGate ──▶ CandidatePrefilter ──▶ VolumeBreakoutValidator
//!                 (^TWII > MA60)       (長紅, 量 ≥ 1500張)     (per candidate, history)
//!                                                                    │
//!               SectorRotationScorer ──▶ SignalClassifier ◀──────────┘
//!               (5-day main sectors)     (A / B tiers)
//!                                              │
//!                                              ▼
//!                                   report text + ScanResult
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use twscan_screener::screener::{ScanOrchestrator, ScreenerConfig};
//!
//! let orchestrator = ScanOrchestrator::new(
//!     ScreenerConfig::default(),
//!     snapshots, history, sectors, notifier, sink,
//! );
//! let outcome = orchestrator.run(None).await?;
//! ```

pub mod breakout;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod prefilter;
pub mod regime;
pub mod report;
pub mod sector;

pub use breakout::{BreakoutMetrics, RejectReason, VolumeBreakoutValidator};
pub use classifier::{CandidateHit, ClassifiedHits, SignalClassifier, SignalTier};
pub use config::{
    BreakoutConfig, ClassifierConfig, PrefilterConfig, RegimeConfig, ScreenerConfig, SectorConfig,
};
pub use engine::{RunSummary, ScanOrchestrator, ScanOutcome, ScanStatus};
pub use prefilter::{CandidatePrefilter, FilterResult, FilterStage};
pub use regime::{evaluate_regime, MaTrend, MarketRegimeGate, RegimeStatus, RegimeVerdict};
pub use report::{JsonFileSink, ResultSink, ScanResult};
pub use sector::{BackwardDays, SectorContext, SectorDailyScore, SectorRotationScorer};
