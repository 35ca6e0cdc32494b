//! twscan screener library.
//!
//! Screens the Taiwan Stock Exchange each trading day for the 爆量長紅突破
//! pattern: a strong bullish candle on a volume surge that closes above a
//! tight consolidation box, gated on the market regime and ranked with
//! sector rotation context.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      twscan (binary)                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐  │
//! │  │  data        │──▶│  screener        │──▶│ notification │  │
//! │  │  TWSE/Yahoo  │   │  ScanOrchestrator│   │ Telegram/log │  │
//! │  └──────────────┘   └────────┬─────────┘   └──────────────┘  │
//! │                              ▼                               │
//! │                     scan_result.json                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod notification;
pub mod screener;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use twscan_common::config::Config;

use crate::data::{TwseSectorProvider, TwseSnapshotProvider, YahooHistoryProvider};
use crate::notification::{LogNotifier, Notifier, TelegramNotifier};
use crate::screener::{JsonFileSink, ResultSink, ScanOrchestrator, ScanOutcome, ScanResult, ScreenerConfig};

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Publish to the log instead of Telegram
    pub dry_run: bool,
}

/// Screening service wired to the live TWSE, Yahoo and Telegram endpoints.
pub struct ScanService {
    orchestrator: ScanOrchestrator,
    notifier_name: &'static str,
}

impl ScanService {
    /// Build the service from validated configuration.
    pub fn new(config: &Config, options: &RunOptions) -> Result<Self> {
        let screener =
            ScreenerConfig::from_config(config).context("Invalid screener configuration")?;

        let notifier: Arc<dyn Notifier> = if options.dry_run || !config.notification.enabled {
            Arc::new(LogNotifier::new(config.notification.max_message_chars))
        } else {
            Arc::new(
                TelegramNotifier::from_config(config)
                    .context("Telegram notifier is not configured")?,
            )
        };
        let notifier_name = notifier.name();

        let orchestrator = ScanOrchestrator::new(
            screener,
            Arc::new(TwseSnapshotProvider::new(&config.http)),
            Arc::new(YahooHistoryProvider::new(&config.http)),
            Arc::new(TwseSectorProvider::new(&config.http)),
            notifier,
            Arc::new(JsonFileSink::new(&config.output.result_path)),
        );

        Ok(Self {
            orchestrator,
            notifier_name,
        })
    }

    pub fn notifier_name(&self) -> &'static str {
        self.notifier_name
    }

    /// Run one scan; see [`ScanOrchestrator::run`].
    pub async fn run(&self, date: Option<NaiveDate>) -> Result<ScanOutcome> {
        self.orchestrator.run(date).await
    }
}

/// Write the empty result record, used when a run cannot even start.
pub fn write_empty_result(path: impl Into<PathBuf>, date: NaiveDate) -> Result<()> {
    JsonFileSink::new(path).write(&ScanResult::empty(date))
}
