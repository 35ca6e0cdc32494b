//! Scan orchestrator.
//!
//! The central coordinator of one screening run:
//! 1. Fetch the day's snapshot
//! 2. Gate on the market regime
//! 3. Prefilter candles
//! 4. Resolve the sector context
//! 5. Validate each candidate against its history, one at a time
//! 6. Classify, publish and export

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use twscan_common::logging::generate_run_id;

use crate::data::{
    sector_of, DailyBar, DailySnapshot, HistoryProvider, SectorInfoProvider, SectorMap,
    SnapshotProvider,
};
use crate::notification::Notifier;

use super::breakout::{RejectReason, VolumeBreakoutValidator};
use super::classifier::{CandidateHit, ClassifiedHits, SignalClassifier};
use super::config::ScreenerConfig;
use super::prefilter::{CandidatePrefilter, FilterResult, FilterStage};
use super::regime::{MarketRegimeGate, RegimeVerdict};
use super::report::{
    hits_message, no_hits_message, regime_blocked_message, ResultSink, ScanResult,
};
use super::sector::{SectorContext, SectorRotationScorer};

// ============================================================================
// Run Outcome
// ============================================================================

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// The pipeline ran to the end (possibly with zero hits)
    Completed,
    /// The market regime gate stopped screening
    RegimeBlocked,
    /// The snapshot had no bars
    NoTradingData,
}

/// Counts per funnel stage and per rejection reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub snapshot_size: usize,
    pub filter_results: Vec<FilterResult>,
    pub rejections: BTreeMap<RejectReason, usize>,
    pub tier_a: usize,
    pub tier_b: usize,
    pub duration_secs: f64,
}

impl RunSummary {
    fn reject(&mut self, reason: RejectReason) {
        *self.rejections.entry(reason).or_default() += 1;
    }

    /// Total candidates rejected after the prefilter.
    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }

    /// Single-line form of the rejection tallies.
    pub fn rejection_line(&self) -> String {
        if self.rejections.is_empty() {
            return "none".to_string();
        }
        self.rejections
            .iter()
            .map(|(reason, count)| format!("{}={}", reason, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn log(&self) {
        for stage in &self.filter_results {
            info!(
                stage = %stage.stage,
                passed = stage.passed,
                eliminated = stage.eliminated,
                elimination_rate = format!("{:.1}%", stage.elimination_rate),
                "Funnel stage"
            );
        }
        info!(
            run_id = %self.run_id,
            snapshot = self.snapshot_size,
            rejected = self.rejected(),
            rejections = %self.rejection_line(),
            tier_a = self.tier_a,
            tier_b = self.tier_b,
            duration = format!("{:.1}s", self.duration_secs),
            "Run summary"
        );
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    pub signal_date: NaiveDate,
    pub regime: Option<RegimeVerdict>,
    pub sector_context: Option<SectorContext>,
    pub hits: ClassifiedHits,
    /// The exported record
    pub result: ScanResult,
    /// Text handed to the notifier
    pub message: String,
    pub summary: RunSummary,
}

// ============================================================================
// Scan Orchestrator
// ============================================================================

/// Sequences the screening stages over injected collaborators.
pub struct ScanOrchestrator {
    config: ScreenerConfig,
    snapshots: Arc<dyn SnapshotProvider>,
    history: Arc<dyn HistoryProvider>,
    sectors: Arc<dyn SectorInfoProvider>,
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn ResultSink>,
    gate: MarketRegimeGate,
    prefilter: CandidatePrefilter,
    validator: VolumeBreakoutValidator,
    scorer: SectorRotationScorer,
    classifier: SignalClassifier,
}

impl ScanOrchestrator {
    pub fn new(
        config: ScreenerConfig,
        snapshots: Arc<dyn SnapshotProvider>,
        history: Arc<dyn HistoryProvider>,
        sectors: Arc<dyn SectorInfoProvider>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let gate = MarketRegimeGate::new(config.regime.clone(), history.clone());
        let prefilter = CandidatePrefilter::new(config.prefilter.clone());
        let validator = VolumeBreakoutValidator::new(config.breakout.clone());
        let scorer = SectorRotationScorer::new(config.sector.clone(), snapshots.clone());
        let classifier = SignalClassifier::new(config.classifier.clone());

        Self {
            config,
            snapshots,
            history,
            sectors,
            notifier,
            sink,
            gate,
            prefilter,
            validator,
            scorer,
            classifier,
        }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Run one scan for `date` (the latest session when `None`).
    ///
    /// The result record is written whatever happens; after a fatal error it
    /// is the empty record dated today and the error is returned.
    pub async fn run(&self, date: Option<NaiveDate>) -> Result<ScanOutcome> {
        let run_id = generate_run_id();
        let today = date.unwrap_or_else(|| Local::now().date_naive());
        info!(run_id = %run_id, date = %today, requested = date.is_some(), "Starting scan");

        match self.scan(run_id.clone(), date, today).await {
            Ok(outcome) => {
                self.sink
                    .write(&outcome.result)
                    .context("Failed to write scan result")?;
                outcome.summary.log();
                Ok(outcome)
            }
            Err(e) => {
                error!(run_id = %run_id, error = %format!("{:#}", e), "Scan aborted");
                if let Err(write_err) = self.sink.write(&ScanResult::empty(today)) {
                    error!(error = %format!("{:#}", write_err), "Failed to write empty scan result");
                }
                Err(e)
            }
        }
    }

    async fn scan(&self, run_id: String, date: Option<NaiveDate>, today: NaiveDate) -> Result<ScanOutcome> {
        let started_at = Utc::now();
        let mut summary = RunSummary {
            run_id,
            ..Default::default()
        };

        let snapshot = self
            .snapshots
            .fetch_daily_snapshot(date)
            .await
            .context("Failed to fetch market snapshot")?;
        summary.snapshot_size = snapshot.bars.len();
        summary
            .filter_results
            .push(FilterResult::new(FilterStage::Input, snapshot.bars.len(), snapshot.bars.len()));

        if !snapshot.is_trading_day() {
            warn!(date = %snapshot.date, "Snapshot is empty, nothing to screen");
            let message = no_hits_message(today);
            self.publish(&message).await;
            return Ok(self.finish(
                ScanStatus::NoTradingData,
                today,
                None,
                None,
                ClassifiedHits::default(),
                message,
                summary,
                started_at,
            ));
        }

        // Phase 1: market regime
        let verdict = self.gate.check(snapshot.date).await?;
        if !verdict.is_bullish() {
            info!(reason = %verdict.reason, "Market regime is not bullish, screening skipped");
            let message = regime_blocked_message(today, &verdict);
            self.publish(&message).await;
            return Ok(self.finish(
                ScanStatus::RegimeBlocked,
                today,
                Some(verdict),
                None,
                ClassifiedHits::default(),
                message,
                summary,
                started_at,
            ));
        }

        // Phase 2: candle prefilter
        let (candidates, prefilter_result) = self.prefilter.filter(&snapshot.bars);
        info!(
            passed = prefilter_result.passed,
            eliminated = prefilter_result.eliminated,
            "Prefilter complete"
        );
        summary.filter_results.push(prefilter_result);

        // Phase 3: sector context
        let sector_map = self.load_sectors().await;
        let context = self.scorer.context(&snapshot, &sector_map).await;
        let signal_date = context.signal_date(today);

        // Phase 4: per-candidate validation
        let hits = self
            .validate_candidates(&candidates, &snapshot, &sector_map, &context, &mut summary)
            .await;
        summary.filter_results.push(FilterResult::new(
            FilterStage::Breakout,
            candidates.len(),
            hits.len(),
        ));

        // Phase 5: tiering and report
        let classified = self.classifier.classify(hits);
        summary.filter_results.push(FilterResult::new(
            FilterStage::Final,
            snapshot.bars.len(),
            classified.len(),
        ));

        let message = if classified.is_empty() {
            no_hits_message(signal_date)
        } else {
            let (tier_a, tier_b) = self.classifier.report_view(&classified);
            hits_message(signal_date, &classified, tier_a, tier_b, &context)
        };
        self.publish(&message).await;

        Ok(self.finish(
            ScanStatus::Completed,
            signal_date,
            Some(verdict),
            Some(context),
            classified,
            message,
            summary,
            started_at,
        ))
    }

    async fn load_sectors(&self) -> SectorMap {
        match self.sectors.fetch_sector_map().await {
            Ok(map) => map,
            Err(e) => {
                warn!(provider = self.sectors.name(), error = %e, "Sector map unavailable, using Unknown");
                SectorMap::new()
            }
        }
    }

    /// Validate candidates sequentially; failures only drop the candidate.
    async fn validate_candidates(
        &self,
        candidates: &[DailyBar],
        snapshot: &DailySnapshot,
        sector_map: &SectorMap,
        context: &SectorContext,
        summary: &mut RunSummary,
    ) -> Vec<CandidateHit> {
        let as_of = snapshot.date;
        let start = as_of - Duration::days(self.validator.config().history_calendar_days);
        let mut hits = Vec::new();

        for bar in candidates {
            let history = match self.history.fetch_history(&bar.code, start, as_of).await {
                Ok(history) => history,
                Err(e) => {
                    warn!(code = %bar.code, error = %e, "History unavailable, skipping candidate");
                    summary.reject(RejectReason::HistoryUnavailable);
                    continue;
                }
            };

            match self.validator.validate(bar, &history, as_of) {
                Ok(metrics) => {
                    let sector = sector_of(sector_map, &bar.code);
                    let hit = CandidateHit::new(bar, metrics, sector, context.is_main(sector));
                    debug!(
                        code = %hit.code,
                        tier = %hit.tier,
                        volume_multiple = hit.volume_multiple,
                        breakout_pct = hit.breakout_pct,
                        "Candidate confirmed"
                    );
                    hits.push(hit);
                }
                Err(reason) => {
                    debug!(code = %bar.code, reason = %reason, "Candidate rejected");
                    summary.reject(reason);
                }
            }
        }

        hits
    }

    /// Fire-and-forget: a delivery failure is logged, never propagated.
    async fn publish(&self, message: &str) {
        if let Err(e) = self.notifier.publish(message).await {
            warn!(notifier = self.notifier.name(), error = %format!("{:#}", e), "Failed to publish report");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        status: ScanStatus,
        signal_date: NaiveDate,
        regime: Option<RegimeVerdict>,
        sector_context: Option<SectorContext>,
        hits: ClassifiedHits,
        message: String,
        mut summary: RunSummary,
        started_at: chrono::DateTime<Utc>,
    ) -> ScanOutcome {
        let result = ScanResult::from_hits(signal_date, &hits);
        summary.tier_a = hits.tier_a.len();
        summary.tier_b = hits.tier_b.len();
        summary.duration_secs = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;

        ScanOutcome {
            status,
            signal_date,
            regime,
            sector_context,
            hits,
            result,
            message,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_tallies() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.rejection_line(), "none");

        summary.reject(RejectReason::NoBreakout);
        summary.reject(RejectReason::NoBreakout);
        summary.reject(RejectReason::InsufficientHistory);
        assert_eq!(summary.rejected(), 3);
        assert_eq!(
            summary.rejection_line(),
            "insufficient_history=1, no_breakout=2"
        );
    }
}
