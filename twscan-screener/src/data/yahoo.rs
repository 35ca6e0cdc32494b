//! Yahoo Finance chart adapter for daily history.
//!
//! Serves both per-instrument history and the market proxy (`^TWII`).
//! Plain TWSE codes are suffixed with `.TW`; anything that already carries a
//! suffix or starts with `^` is requested as-is.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use serde::Deserialize;
use tracing::debug;
use twscan_common::config::HttpConfig;

use super::http::HttpFetcher;
use super::provider::{HistoryProvider, ProviderError};
use super::{normalize_history, HistoricalBar};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Chart endpoint; the symbol is appended to the path
const CHART_PATH: &str = "/v8/finance/chart";

/// Suffix Yahoo uses for TWSE listings
const TWSE_SUFFIX: &str = ".TW";

/// Map a TWSE code to a Yahoo symbol.
fn to_yahoo_symbol(code: &str) -> String {
    let code = code.trim();
    if code.starts_with('^') || code.contains('.') {
        code.to_string()
    } else {
        format!("{}{}", code, TWSE_SUFFIX)
    }
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    /// Exchange offset from UTC in seconds (28800 for Taipei)
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

/// Column-oriented OHLCV; any cell may be null on halted sessions.
#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Turn a chart payload into ascending, deduplicated bars.
fn parse_chart(symbol: &str, envelope: ChartEnvelope) -> Result<Vec<HistoricalBar>, ProviderError> {
    if let Some(err) = envelope.chart.error {
        return Err(if err.code.eq_ignore_ascii_case("Not Found") {
            ProviderError::DataNotAvailable(format!("{}: {}", symbol, err.description))
        } else {
            ProviderError::Parse(format!("{}: {} {}", symbol, err.code, err.description))
        });
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(ProviderError::DataNotAvailable(format!("{}: empty chart", symbol)));
    };

    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let cell = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();
    let offset = result.meta.gmtoffset;

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(HistoricalBar {
                date,
                open: cell(&quote.open, i)?,
                high: cell(&quote.high, i)?,
                low: cell(&quote.low, i)?,
                close: cell(&quote.close, i)?,
                volume: cell(&quote.volume, i)?,
            })
        })
        .filter(|b| [b.open, b.high, b.low, b.close, b.volume].iter().all(|v| v.is_finite()))
        .collect();

    Ok(normalize_history(bars))
}

/// Unix seconds at midnight UTC of `date`.
fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

// ============================================================================
// Provider
// ============================================================================

/// History provider backed by the Yahoo chart API.
pub struct YahooHistoryProvider {
    http: HttpFetcher,
    base_url: String,
}

impl YahooHistoryProvider {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            http: HttpFetcher::new(config),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Use another chart API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl HistoryProvider for YahooHistoryProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_history(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalBar>, ProviderError> {
        if start > end {
            return Err(ProviderError::InvalidRequest(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        let symbol = to_yahoo_symbol(code);
        let url = format!("{}{}/{}", self.base_url, CHART_PATH, symbol);
        let query = [
            ("period1", epoch_seconds(start).to_string()),
            ("period2", epoch_seconds(end + Duration::days(1)).to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];

        let envelope: ChartEnvelope = self.http.get_json(&url, &query).await?;
        let bars = parse_chart(&symbol, envelope)?;

        debug!(symbol = %symbol, bars = bars.len(), "Fetched history");
        Ok(bars)
    }
}

// ============================================================================
// Tests
// ============================================================================
