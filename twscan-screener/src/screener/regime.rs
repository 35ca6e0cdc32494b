//! Market regime gate.
//!
//! Screening only runs when the broad-market proxy closes strictly above its
//! moving average. Missing or short history fails closed. The verdict also
//! reports which way the average moved since the previous session; the
//! direction is informational and does not affect the gate.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::config::RegimeConfig;
use super::indicators::sma;
use crate::data::HistoryProvider;

/// Outcome class of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeStatus {
    Bullish,
    Bearish,
    InsufficientData,
}

/// Direction of the moving average versus the previous session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaTrend {
    Rising,
    Falling,
    Flat,
}

impl MaTrend {
    fn between(previous: f64, current: f64) -> Self {
        if current > previous {
            Self::Rising
        } else if current < previous {
            Self::Falling
        } else {
            Self::Flat
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Flat => "flat",
        }
    }
}

/// Gate verdict with the numbers behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeVerdict {
    pub status: RegimeStatus,
    pub latest_close: Option<f64>,
    pub moving_average: Option<f64>,
    /// Average over the window ending one session earlier
    pub previous_moving_average: Option<f64>,
    pub ma_trend: Option<MaTrend>,
    /// Human-readable explanation
    pub reason: String,
}

impl RegimeVerdict {
    /// Only a bullish verdict lets screening proceed.
    pub fn is_bullish(&self) -> bool {
        self.status == RegimeStatus::Bullish
    }

    fn insufficient(reason: String) -> Self {
        Self {
            status: RegimeStatus::InsufficientData,
            latest_close: None,
            moving_average: None,
            previous_moving_average: None,
            ma_trend: None,
            reason,
        }
    }
}

/// Compare the latest close against the trailing `window`-session average.
///
/// Needs at least `window + 1` closes: the extra one yields the previous
/// session's average, from which the MA direction is reported.
pub fn evaluate_regime(closes: &[f64], window: usize) -> RegimeVerdict {
    if window == 0 || closes.len() < window + 1 {
        return RegimeVerdict::insufficient(format!(
            "need {} sessions for MA{}, have {}",
            window + 1,
            window,
            closes.len()
        ));
    }

    let latest = closes[closes.len() - 1];
    let Some(ma) = sma(closes, window).filter(|_| latest.is_finite()) else {
        return RegimeVerdict::insufficient(format!("MA{} is undefined", window));
    };
    let previous_ma = sma(&closes[..closes.len() - 1], window);
    let trend = previous_ma.map(|prev| MaTrend::between(prev, ma));

    let (status, position) = if latest > ma {
        (RegimeStatus::Bullish, "above")
    } else {
        (RegimeStatus::Bearish, "not above")
    };

    RegimeVerdict {
        status,
        latest_close: Some(latest),
        moving_average: Some(ma),
        previous_moving_average: previous_ma,
        ma_trend: trend,
        reason: format!(
            "close {:.2} {} MA{} {:.2} ({})",
            latest,
            position,
            window,
            ma,
            trend.map_or("direction unknown", |t| t.label())
        ),
    }
}

/// Fetches the proxy history and evaluates the regime.
pub struct MarketRegimeGate {
    config: RegimeConfig,
    history: Arc<dyn HistoryProvider>,
}

impl MarketRegimeGate {
    pub fn new(config: RegimeConfig, history: Arc<dyn HistoryProvider>) -> Self {
        Self { config, history }
    }

    /// Evaluate the regime as of `today` (bars after `today` are ignored).
    ///
    /// A fetch failure is an error; the caller treats it as fatal.
    pub async fn check(&self, today: NaiveDate) -> Result<RegimeVerdict> {
        let start = today - Duration::days(self.config.history_calendar_days);
        let bars = self
            .history
            .fetch_history(&self.config.proxy_symbol, start, today)
            .await
            .with_context(|| format!("Failed to fetch {} history", self.config.proxy_symbol))?;

        let closes: Vec<f64> = bars
            .iter()
            .filter(|b| b.date <= today)
            .map(|b| b.close)
            .collect();

        let verdict = evaluate_regime(&closes, self.config.ma_window);
        info!(
            proxy = %self.config.proxy_symbol,
            sessions = closes.len(),
            status = ?verdict.status,
            ma_trend = ?verdict.ma_trend,
            reason = %verdict.reason,
            "Market regime evaluated"
        );
        Ok(verdict)
    }
}
