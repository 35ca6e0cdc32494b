//! HTTP adapter tests against a local mock server.
//!
//! Each adapter is pointed at a `wiremock` server so the request shape
//! (path, query) and the response handling (retry, fallback, chunking) are
//! checked end to end through `reqwest`.

use chrono::NaiveDate;
use serde_json::{json, Value};
use twscan_common::config::HttpConfig;
use twscan_screener::data::{
    HistoryProvider, ProviderError, SectorInfoProvider, SnapshotProvider, TwseSectorProvider,
    TwseSnapshotProvider, YahooHistoryProvider,
};
use twscan_screener::notification::{Notifier, TelegramNotifier};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_config(retry_count: u32) -> HttpConfig {
    HttpConfig {
        retry_count,
        retry_backoff_ms: 1,
        ..HttpConfig::default()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stock_day_all_row(date: Option<&str>, code: &str) -> Value {
    let mut row = json!({
        "Code": code, "Name": "台積電",
        "TradeVolume": "40,123,456", "TradeValue": "1", "OpeningPrice": "1,000.00",
        "HighestPrice": "1,090.00", "LowestPrice": "990.00", "ClosingPrice": "1,080.00",
        "Change": "80.0000", "Transaction": "1"
    });
    if let Some(date) = date {
        row["Date"] = json!(date);
    }
    row
}

// ============================================================================
// TWSE snapshot
// ============================================================================

#[tokio::test]
async fn test_twse_latest_snapshot_uses_published_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/exchangeReport/STOCK_DAY_ALL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            stock_day_all_row(Some("1131018"), "2330"),
            stock_day_all_row(Some("1131018"), "00878"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        TwseSnapshotProvider::new(&http_config(1)).with_base_urls(server.uri(), server.uri());
    let snapshot = provider.fetch_daily_snapshot(None).await.unwrap();

    assert_eq!(snapshot.date, date(2024, 10, 18));
    assert_eq!(snapshot.bars.len(), 1);
    assert_eq!(snapshot.bars[0].code, "2330");
}

#[tokio::test]
async fn test_twse_latest_snapshot_without_date_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/exchangeReport/STOCK_DAY_ALL"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([stock_day_all_row(None, "2330")])),
        )
        .mount(&server)
        .await;

    let provider =
        TwseSnapshotProvider::new(&http_config(1)).with_base_urls(server.uri(), server.uri());
    let err = provider.fetch_daily_snapshot(None).await.unwrap_err();

    assert!(matches!(err, ProviderError::DataNotAvailable(_)));
}

#[tokio::test]
async fn test_twse_dated_report_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exchangeReport/MI_INDEX"))
        .and(query_param("response", "json"))
        .and(query_param("date", "20241018"))
        .and(query_param("type", "ALLBUT0999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stat": "OK",
            "date": "20241018",
            "tables": [{
                "title": "每日收盤行情",
                "fields": ["證券代號", "證券名稱", "成交股數", "開盤價", "最高價",
                           "最低價", "收盤價", "漲跌(+/-)", "漲跌價差"],
                "data": [["2330", "台積電", "40,123,456", "1,000.00", "1,090.00",
                          "990.00", "1,080.00", "+", "80.00"]]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        TwseSnapshotProvider::new(&http_config(1)).with_base_urls(server.uri(), server.uri());
    let snapshot = provider
        .fetch_daily_snapshot(Some(date(2024, 10, 18)))
        .await
        .unwrap();

    assert_eq!(snapshot.date, date(2024, 10, 18));
    assert_eq!(snapshot.bars.len(), 1);
    assert!((snapshot.bars[0].change_pct - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_twse_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/exchangeReport/STOCK_DAY_ALL"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/exchangeReport/STOCK_DAY_ALL"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([stock_day_all_row(Some("1131018"), "2330")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        TwseSnapshotProvider::new(&http_config(3)).with_base_urls(server.uri(), server.uri());
    let snapshot = provider.fetch_daily_snapshot(None).await.unwrap();

    assert!(snapshot.is_trading_day());
}

#[tokio::test]
async fn test_twse_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exchangeReport/MI_INDEX"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        TwseSnapshotProvider::new(&http_config(3)).with_base_urls(server.uri(), server.uri());
    let err = provider
        .fetch_daily_snapshot(Some(date(2024, 10, 18)))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Http { status: 404, .. }));
}

// ============================================================================
// Yahoo history
// ============================================================================

#[tokio::test]
async fn test_yahoo_history_request_and_null_rows() {
    let server = MockServer::start().await;
    // period2 is the day after `end` so the end session is included
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/2330.TW"))
        .and(query_param("period1", "1728864000"))
        .and(query_param("period2", "1729296000"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 28800 },
                    "timestamp": [1728954000, 1729040400, 1729213200],
                    "indicators": { "quote": [{
                        "open":   [100.0, null, 102.0],
                        "high":   [105.0, 106.0, 107.0],
                        "low":    [99.0, 100.0, 101.0],
                        "close":  [104.0, 105.0, 106.0],
                        "volume": [1000.0, 2000.0, 3000.0]
                    }]}
                }],
                "error": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = YahooHistoryProvider::new(&http_config(1)).with_base_url(server.uri());
    let bars = provider
        .fetch_history("2330", date(2024, 10, 14), date(2024, 10, 18))
        .await
        .unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].date, date(2024, 10, 15));
    assert_eq!(bars[1].date, date(2024, 10, 18));
}

#[tokio::test]
async fn test_yahoo_unknown_symbol_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/9999.TW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found" }
            }
        })))
        .mount(&server)
        .await;

    let provider = YahooHistoryProvider::new(&http_config(1)).with_base_url(server.uri());
    let err = provider
        .fetch_history("9999", date(2024, 10, 14), date(2024, 10, 18))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::DataNotAvailable(_)));
}

// ============================================================================
// Sector profile
// ============================================================================

#[tokio::test]
async fn test_sector_profile_maps_industry_codes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/opendata/t187ap03_L"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "公司代號": "2330", "公司簡稱": "台積電", "產業別": "24" },
            { "公司代號": "1101", "公司簡稱": "台泥", "產業別": "01" }
        ])))
        .mount(&server)
        .await;

    let provider = TwseSectorProvider::new(&http_config(1)).with_base_url(server.uri());
    let sectors = provider.fetch_sector_map().await.unwrap();

    assert_eq!(sectors.get("2330").map(String::as_str), Some("半導體業"));
    assert_eq!(sectors.get("1101").map(String::as_str), Some("水泥工業"));
}

#[tokio::test]
async fn test_sector_profile_outage_yields_empty_map() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/opendata/t187ap03_L"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let provider = TwseSectorProvider::new(&http_config(2)).with_base_url(server.uri());
    let sectors = provider.fetch_sector_map().await.unwrap();

    assert!(sectors.is_empty());
}

// ============================================================================
// Telegram
// ============================================================================

#[tokio::test]
async fn test_telegram_sends_each_chunk_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({ "chat_id": "-10042" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(3)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new("123:abc", "-10042", &http_config(1), 10)
        .with_api_base(server.uri());
    notifier
        .publish("line one\nline two\nline three")
        .await
        .unwrap();

    let texts: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap()["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["line one", "line two", "line three"]);
}

#[tokio::test]
async fn test_telegram_rejection_fails_publish() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new("123:abc", "-10042", &http_config(3), 4000)
        .with_api_base(server.uri());
    let err = notifier.publish("report").await.unwrap_err();

    assert!(format!("{:#}", err).contains("chat not found"));
}
