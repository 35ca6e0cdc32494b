//! TWSE full-market snapshot adapter.
//!
//! # Endpoints
//! - Latest session: OpenAPI `STOCK_DAY_ALL` (array of objects)
//! - Past sessions: `MI_INDEX` daily report (tables of string rows)
//!
//! Both payloads are mapped onto [`DailyBar`] through alias lists so that
//! English and Chinese column names are accepted. Only 4-character codes
//! (ordinary shares) are kept; warrants, ETFs with suffixes and similar
//! instruments are dropped.

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use serde_json::{Map, Value};
use tracing::{debug, info};
use twscan_common::config::HttpConfig;

use super::http::HttpFetcher;
use super::provider::{ProviderError, SnapshotProvider};
use super::{DailyBar, DailySnapshot};

// ============================================================================
// Constants
// ============================================================================

/// TWSE OpenAPI host
pub(crate) const OPENAPI_BASE_URL: &str = "https://openapi.twse.com.tw";

/// TWSE website host serving the historical reports
const REPORT_BASE_URL: &str = "https://www.twse.com.tw";

/// Latest full-market daily quotes
const STOCK_DAY_ALL_PATH: &str = "/v1/exchangeReport/STOCK_DAY_ALL";

/// Daily market report for an arbitrary date
const MI_INDEX_PATH: &str = "/exchangeReport/MI_INDEX";

/// Offset between the ROC (Minguo) calendar and the Gregorian calendar
const ROC_YEAR_OFFSET: i32 = 1911;

const CODE_COLUMNS: &[&str] = &["Code", "證券代號", "股票代號"];
const NAME_COLUMNS: &[&str] = &["Name", "證券名稱", "股票名稱"];
const OPEN_COLUMNS: &[&str] = &["OpeningPrice", "Open", "開盤價"];
const HIGH_COLUMNS: &[&str] = &["HighestPrice", "High", "最高價"];
const LOW_COLUMNS: &[&str] = &["LowestPrice", "Low", "最低價"];
const CLOSE_COLUMNS: &[&str] = &["ClosingPrice", "Close", "收盤價"];
const VOLUME_COLUMNS: &[&str] = &["TradeVolume", "成交股數", "成交量"];
/// Absolute price difference versus the previous close
const CHANGE_COLUMNS: &[&str] = &["Change", "漲跌價差"];
/// Already expressed in percent
const CHANGE_PCT_COLUMNS: &[&str] = &["ChangePercent", "漲跌幅", "漲跌百分比"];
const SIGN_COLUMNS: &[&str] = &["漲跌(+/-)"];

// ============================================================================
// Value Coercion
// ============================================================================

/// Coerce a JSON cell to a number.
///
/// Strings have thousands separators removed; blanks and the `--` placeholder
/// TWSE uses for untraded instruments become `None`.
fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() || cleaned.starts_with("--") {
                return None;
            }
            cleaned.trim_start_matches('+').parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a ROC calendar date.
///
/// Accepts the compact form (`1131018`) and the slashed form (`113/10/18`).
pub fn parse_roc_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let (year, month, day) = if raw.contains('/') {
        let mut parts = raw.split('/');
        let y = parts.next()?.parse::<i32>().ok()?;
        let m = parts.next()?.parse::<u32>().ok()?;
        let d = parts.next()?.parse::<u32>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        (y, m, d)
    } else {
        if raw.len() < 5 || !raw.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let (y, md) = raw.split_at(raw.len() - 4);
        (
            y.parse::<i32>().ok()?,
            md[..2].parse::<u32>().ok()?,
            md[2..].parse::<u32>().ok()?,
        )
    };
    NaiveDate::from_ymd_opt(year + ROC_YEAR_OFFSET, month, day)
}

/// Ordinary shares have exactly four characters.
fn is_ordinary_share(code: &str) -> bool {
    code.chars().count() == 4
}

/// How the day's change is expressed in a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ChangeKind {
    Absolute,
    Percent,
}

/// Raw fields of one row before validation.
struct RawQuote {
    code: String,
    name: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    change: Option<f64>,
}

impl RawQuote {
    /// Validate the row and derive the percent change.
    ///
    /// Rows with missing prices, an inverted range or no usable previous close
    /// are dropped.
    fn into_bar(self, kind: ChangeKind) -> Option<DailyBar> {
        if !is_ordinary_share(&self.code) {
            return None;
        }
        let (open, high, low, close) = (self.open?, self.high?, self.low?, self.close?);
        let volume = self.volume?;
        let change = self.change?;
        if open <= 0.0 || close <= 0.0 || high < low || volume < 0.0 {
            return None;
        }

        let change_pct = match kind {
            ChangeKind::Percent => change,
            ChangeKind::Absolute => {
                let previous = close - change;
                if previous <= 0.0 {
                    return None;
                }
                change / previous * 100.0
            }
        };
        if !change_pct.is_finite() {
            return None;
        }

        Some(DailyBar {
            code: self.code,
            name: self.name,
            open,
            high,
            low,
            close,
            volume,
            change_pct,
        })
    }
}

// ============================================================================
// STOCK_DAY_ALL
// ============================================================================

fn pick_key<'a>(keys: &'a [String], aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .find_map(|alias| keys.iter().find(|k| k.trim() == *alias))
        .map(String::as_str)
}

fn require_key<'a>(keys: &'a [String], aliases: &[&str]) -> Result<&'a str, ProviderError> {
    pick_key(keys, aliases).ok_or_else(|| {
        ProviderError::Parse(format!("missing column (expected one of {:?})", aliases))
    })
}

/// Map `STOCK_DAY_ALL` rows onto bars, returning the ROC `Date` if present.
fn parse_stock_day_all(
    rows: &[Map<String, Value>],
) -> Result<(Option<NaiveDate>, Vec<DailyBar>), ProviderError> {
    let Some(first) = rows.first() else {
        return Ok((None, Vec::new()));
    };
    let keys: Vec<String> = first.keys().cloned().collect();

    let code = require_key(&keys, CODE_COLUMNS)?;
    let name = require_key(&keys, NAME_COLUMNS)?;
    let open = require_key(&keys, OPEN_COLUMNS)?;
    let high = require_key(&keys, HIGH_COLUMNS)?;
    let low = require_key(&keys, LOW_COLUMNS)?;
    let close = require_key(&keys, CLOSE_COLUMNS)?;
    let volume = require_key(&keys, VOLUME_COLUMNS)?;
    let (change, kind) = match pick_key(&keys, CHANGE_COLUMNS) {
        Some(key) => (key, ChangeKind::Absolute),
        None => (require_key(&keys, CHANGE_PCT_COLUMNS)?, ChangeKind::Percent),
    };

    let date = first
        .get("Date")
        .and_then(parse_text)
        .and_then(|d| parse_roc_date(&d));

    let number = |row: &Map<String, Value>, key: &str| row.get(key).and_then(parse_number);

    let bars = rows
        .iter()
        .filter_map(|row| {
            RawQuote {
                code: row.get(code).and_then(parse_text)?,
                name: row.get(name).and_then(parse_text).unwrap_or_default(),
                open: number(row, open),
                high: number(row, high),
                low: number(row, low),
                close: number(row, close),
                volume: number(row, volume),
                change: number(row, change),
            }
            .into_bar(kind)
        })
        .collect();

    Ok((date, bars))
}

// ============================================================================
// MI_INDEX
// ============================================================================

/// A header row plus string data rows.
struct ReportTable<'a> {
    fields: Vec<String>,
    data: &'a [Value],
}

impl ReportTable<'_> {
    fn column(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.fields.iter().position(|f| f.trim() == *alias))
    }
}

/// Collect every `(fields, data)` pair of the report.
///
/// Newer payloads carry a `tables` array; older ones use numbered
/// `fieldsN`/`dataN` keys.
fn report_tables(payload: &Value) -> Vec<ReportTable<'_>> {
    let to_fields = |v: &Value| -> Option<Vec<String>> {
        v.as_array()
            .map(|a| a.iter().filter_map(parse_text).collect())
    };

    let mut tables = Vec::new();

    if let Some(list) = payload.get("tables").and_then(Value::as_array) {
        for table in list {
            if let (Some(fields), Some(data)) = (
                table.get("fields").and_then(to_fields),
                table.get("data").and_then(Value::as_array),
            ) {
                tables.push(ReportTable { fields, data });
            }
        }
    }

    if let Some(object) = payload.as_object() {
        for (key, value) in object {
            let Some(suffix) = key.strip_prefix("fields") else {
                continue;
            };
            let data_key = format!("data{}", suffix);
            if let (Some(fields), Some(data)) = (
                to_fields(value),
                object.get(&data_key).and_then(Value::as_array),
            ) {
                tables.push(ReportTable { fields, data });
            }
        }
    }

    tables
}

/// Negative iff the sign cell contains a minus (the cell is often HTML).
fn sign_of(cell: Option<&Value>) -> f64 {
    match cell.and_then(Value::as_str) {
        Some(s) if s.contains('-') => -1.0,
        _ => 1.0,
    }
}

/// Map a `MI_INDEX` payload onto bars.
///
/// `stat != "OK"` or a missing stock table means the date was not a trading
/// day, which is reported as no bars rather than an error.
fn parse_mi_index(payload: &Value) -> Result<(Option<NaiveDate>, Vec<DailyBar>), ProviderError> {
    let stat = payload.get("stat").and_then(Value::as_str).unwrap_or("");
    if stat.trim() != "OK" {
        debug!(stat = stat, "MI_INDEX reports no data");
        return Ok((None, Vec::new()));
    }

    let date = payload
        .get("date")
        .and_then(Value::as_str)
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y%m%d").ok());

    let tables = report_tables(payload);
    let Some(table) = tables
        .into_iter()
        .find(|t| t.column(&["證券代號"]).is_some())
    else {
        return Ok((date, Vec::new()));
    };

    let missing = |name: &str| ProviderError::Parse(format!("MI_INDEX table has no {} column", name));
    let code = table.column(CODE_COLUMNS).ok_or_else(|| missing("code"))?;
    let name = table.column(NAME_COLUMNS).ok_or_else(|| missing("name"))?;
    let open = table.column(OPEN_COLUMNS).ok_or_else(|| missing("open"))?;
    let high = table.column(HIGH_COLUMNS).ok_or_else(|| missing("high"))?;
    let low = table.column(LOW_COLUMNS).ok_or_else(|| missing("low"))?;
    let close = table.column(CLOSE_COLUMNS).ok_or_else(|| missing("close"))?;
    let volume = table.column(VOLUME_COLUMNS).ok_or_else(|| missing("volume"))?;
    let change = table.column(CHANGE_COLUMNS).ok_or_else(|| missing("change"))?;
    let sign = table.column(SIGN_COLUMNS);

    let bars = table
        .data
        .iter()
        .filter_map(Value::as_array)
        .filter_map(|row| {
            let number = |idx: usize| row.get(idx).and_then(parse_number);
            let signed_change = number(change).map(|c| c.abs() * sign_of(sign.and_then(|i| row.get(i))));
            RawQuote {
                code: row.get(code).and_then(parse_text)?,
                name: row.get(name).and_then(parse_text).unwrap_or_default(),
                open: number(open),
                high: number(high),
                low: number(low),
                close: number(close),
                volume: number(volume),
                change: signed_change,
            }
            .into_bar(ChangeKind::Absolute)
        })
        .collect();

    Ok((date, bars))
}

// ============================================================================
// Provider
// ============================================================================

/// Snapshot provider backed by the TWSE public endpoints.
pub struct TwseSnapshotProvider {
    http: HttpFetcher,
    openapi_base: String,
    report_base: String,
}

impl TwseSnapshotProvider {
    /// Create a provider using the snapshot timeout from `config`.
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            http: HttpFetcher::with_timeout(config, config.snapshot_timeout_secs),
            openapi_base: OPENAPI_BASE_URL.to_string(),
            report_base: REPORT_BASE_URL.to_string(),
        }
    }

    /// Point both endpoints at other hosts (mirrors, local servers).
    pub fn with_base_urls(
        mut self,
        openapi_base: impl Into<String>,
        report_base: impl Into<String>,
    ) -> Self {
        self.openapi_base = openapi_base.into();
        self.report_base = report_base.into();
        self
    }

    async fn fetch_latest(&self) -> Result<DailySnapshot, ProviderError> {
        let url = format!("{}{}", self.openapi_base, STOCK_DAY_ALL_PATH);
        let rows: Vec<Map<String, Value>> = self.http.get_json(&url, &[]).await?;
        let (date, bars) = parse_stock_day_all(&rows)?;
        let date = match date {
            Some(date) => date,
            // nothing published, so there is no session to misdate
            None if bars.is_empty() => Local::now().date_naive(),
            None => {
                return Err(ProviderError::DataNotAvailable(
                    "STOCK_DAY_ALL rows carry no trade date".into(),
                ))
            }
        };

        info!(date = %date, rows = rows.len(), bars = bars.len(), "Fetched latest TWSE snapshot");
        Ok(DailySnapshot { date, bars })
    }

    async fn fetch_for_date(&self, date: NaiveDate) -> Result<DailySnapshot, ProviderError> {
        let query = [
            ("response", "json".to_string()),
            ("date", format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())),
            ("type", "ALLBUT0999".to_string()),
        ];
        let url = format!("{}{}", self.report_base, MI_INDEX_PATH);
        let payload: Value = self.http.get_json(&url, &query).await?;
        let (reported, bars) = parse_mi_index(&payload)?;

        debug!(date = %date, bars = bars.len(), "Fetched TWSE daily report");
        Ok(DailySnapshot {
            date: reported.unwrap_or(date),
            bars,
        })
    }
}

#[async_trait]
impl SnapshotProvider for TwseSnapshotProvider {
    fn name(&self) -> &'static str {
        "twse"
    }

    async fn fetch_daily_snapshot(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<DailySnapshot, ProviderError> {
        match date {
            Some(date) => self.fetch_for_date(date).await,
            None => self.fetch_latest().await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_roc_date() {
        assert_eq!(
            parse_roc_date("1131018"),
            NaiveDate::from_ymd_opt(2024, 10, 18)
        );
        assert_eq!(
            parse_roc_date("113/10/18"),
            NaiveDate::from_ymd_opt(2024, 10, 18)
        );
        assert_eq!(parse_roc_date("99/01/04"), NaiveDate::from_ymd_opt(2010, 1, 4));
        assert_eq!(parse_roc_date("1131340"), None);
        assert_eq!(parse_roc_date("abc"), None);
        assert_eq!(parse_roc_date(""), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(&json!("1,234,567")), Some(1_234_567.0));
        assert_eq!(parse_number(&json!("+0.50")), Some(0.5));
        assert_eq!(parse_number(&json!("-1.5")), Some(-1.5));
        assert_eq!(parse_number(&json!(42)), Some(42.0));
        assert_eq!(parse_number(&json!("--")), None);
        assert_eq!(parse_number(&json!("")), None);
        assert_eq!(parse_number(&json!(null)), None);
    }

    #[test]
    fn test_parse_stock_day_all() {
        let payload = json!([
            {
                "Date": "1131018", "Code": "2330", "Name": "台積電",
                "TradeVolume": "40,123,456", "TradeValue": "1", "OpeningPrice": "1,000.00",
                "HighestPrice": "1,090.00", "LowestPrice": "990.00", "ClosingPrice": "1,080.00",
                "Change": "80.0000", "Transaction": "1"
            },
            {
                "Date": "1131018", "Code": "00878", "Name": "國泰永續高股息",
                "TradeVolume": "1,000", "TradeValue": "1", "OpeningPrice": "22.00",
                "HighestPrice": "22.10", "LowestPrice": "21.90", "ClosingPrice": "22.00",
                "Change": "0.0000", "Transaction": "1"
            },
            {
                "Date": "1131018", "Code": "1101", "Name": "台泥",
                "TradeVolume": "0", "TradeValue": "0", "OpeningPrice": "--",
                "HighestPrice": "--", "LowestPrice": "--", "ClosingPrice": "--",
                "Change": "0.0000", "Transaction": "0"
            }
        ]);
        let rows: Vec<Map<String, Value>> = serde_json::from_value(payload).unwrap();

        let (date, bars) = parse_stock_day_all(&rows).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 10, 18));
        assert_eq!(bars.len(), 1);

        let tsmc = &bars[0];
        assert_eq!(tsmc.code, "2330");
        assert!((tsmc.volume - 40_123_456.0).abs() < 1e-6);
        assert!((tsmc.change_pct - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_stock_day_all_percent_column() {
        let payload = json!([
            {
                "證券代號": "2317", "證券名稱": "鴻海", "開盤價": "200", "最高價": "212",
                "最低價": "199", "收盤價": "210", "成交股數": "3,000,000", "漲跌幅": "5.0"
            }
        ]);
        let rows: Vec<Map<String, Value>> = serde_json::from_value(payload).unwrap();

        let (date, bars) = parse_stock_day_all(&rows).unwrap();
        assert!(date.is_none());
        assert_eq!(bars.len(), 1);
        assert!((bars[0].change_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_stock_day_all_missing_column() {
        let payload = json!([{ "Code": "2330", "Name": "台積電" }]);
        let rows: Vec<Map<String, Value>> = serde_json::from_value(payload).unwrap();

        assert!(matches!(
            parse_stock_day_all(&rows),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_stock_day_all_empty() {
        let (date, bars) = parse_stock_day_all(&[]).unwrap();
        assert!(date.is_none());
        assert!(bars.is_empty());
    }

    fn mi_index_payload() -> Value {
        json!({
            "stat": "OK",
            "date": "20241018",
            "tables": [
                {
                    "title": "價格指數",
                    "fields": ["指數", "收盤指數"],
                    "data": [["發行量加權股價指數", "23,487.35"]]
                },
                {
                    "title": "每日收盤行情",
                    "fields": ["證券代號", "證券名稱", "成交股數", "成交筆數", "成交金額",
                               "開盤價", "最高價", "最低價", "收盤價", "漲跌(+/-)", "漲跌價差"],
                    "data": [
                        ["2330", "台積電", "40,123,456", "1", "1", "1,000.00", "1,090.00",
                         "990.00", "1,080.00", "<p style= color:red>+</p>", "80.00"],
                        ["2603", "長榮", "9,000,000", "1", "1", "200.00", "201.00",
                         "189.00", "190.00", "<p style= color:green>-</p>", "10.00"],
                        ["030001", "權證", "1,000", "1", "1", "1.00", "1.10",
                         "0.90", "1.00", "X", "0.00"]
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_parse_mi_index() {
        let (date, bars) = parse_mi_index(&mi_index_payload()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 10, 18));
        assert_eq!(bars.len(), 2);

        assert!((bars[0].change_pct - 8.0).abs() < 1e-9);
        // 190 closed 10 down from 200
        assert!((bars[1].change_pct + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_mi_index_legacy_keys() {
        let payload = json!({
            "stat": "OK",
            "date": "20150105",
            "fields9": ["證券代號", "證券名稱", "成交股數", "開盤價", "最高價", "最低價",
                        "收盤價", "漲跌(+/-)", "漲跌價差"],
            "data9": [["2330", "台積電", "1,000", "100", "105", "99", "104", "+", "4.00"]]
        });

        let (_, bars) = parse_mi_index(&payload).unwrap();
        assert_eq!(bars.len(), 1);
        assert!((bars[0].change_pct - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_mi_index_holiday() {
        let payload = json!({ "stat": "很抱歉，沒有符合條件的資料!" });
        let (date, bars) = parse_mi_index(&payload).unwrap();
        assert!(date.is_none());
        assert!(bars.is_empty());
    }

    #[test]
    fn test_provider_name() {
        let provider = TwseSnapshotProvider::new(&HttpConfig::default());
        assert_eq!(provider.name(), "twse");
    }
}
