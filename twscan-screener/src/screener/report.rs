//! Report generation and result export.
//!
//! Produces:
//! - The Telegram message text (ranked, truncated per tier)
//! - The [`ScanResult`] record persisted through a [`ResultSink`]

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::classifier::{CandidateHit, ClassifiedHits};
use super::regime::RegimeVerdict;
use super::sector::SectorContext;

// ============================================================================
// Scan Result
// ============================================================================

/// The externally persisted record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(rename = "signalDate")]
    pub signal_date: NaiveDate,
    /// Every hit, tier A first, in rank order
    #[serde(rename = "stocks")]
    pub all_codes: Vec<String>,
    #[serde(rename = "stocksA")]
    pub tier_a_codes: Vec<String>,
    #[serde(rename = "stocksB")]
    pub tier_b_codes: Vec<String>,
}

impl ScanResult {
    /// A run with no hits.
    pub fn empty(signal_date: NaiveDate) -> Self {
        Self {
            signal_date,
            all_codes: Vec::new(),
            tier_a_codes: Vec::new(),
            tier_b_codes: Vec::new(),
        }
    }

    /// Untruncated export of the classified hits.
    pub fn from_hits(signal_date: NaiveDate, hits: &ClassifiedHits) -> Self {
        let codes = |list: &[CandidateHit]| list.iter().map(|h| h.code.clone()).collect::<Vec<_>>();
        Self {
            signal_date,
            all_codes: hits.all().map(|h| h.code.clone()).collect(),
            tier_a_codes: codes(&hits.tier_a),
            tier_b_codes: codes(&hits.tier_b),
        }
    }
}

// ============================================================================
// Result Sink
// ============================================================================

/// Destination of the per-run [`ScanResult`]; each write replaces the last.
pub trait ResultSink: Send + Sync {
    fn write(&self, result: &ScanResult) -> Result<()>;
}

/// Writes the result as pretty JSON, atomically replacing the target file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonFileSink {
    fn write(&self, result: &ScanResult) -> Result<()> {
        let json = serde_json::to_string_pretty(result).context("Failed to serialize scan result")?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).context("Failed to create result directory")?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scan_result.json".to_string());
        let tmp_path = parent.join(format!(".{}.tmp", file_name));

        {
            let mut file = std::fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(json.as_bytes())
                .and_then(|_| file.write_all(b"\n"))
                .context("Failed to write scan result")?;
            file.sync_all().context("Failed to flush scan result")?;
        }

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move result into {}", self.path.display()))?;

        tracing::info!(
            path = %self.path.display(),
            stocks = result.all_codes.len(),
            "Scan result written"
        );
        Ok(())
    }
}

// ============================================================================
// Message Text
// ============================================================================

/// Pattern name used in every message header.
pub const PATTERN_TITLE: &str = "爆量長紅突破";

/// One report line for a hit.
pub fn format_hit_line(hit: &CandidateHit) -> String {
    let star = if hit.is_main_sector { "★" } else { "" };
    format!(
        "{} {}｜{:.2}%｜量 {:.0}張 ({:.1}倍)｜實體 {:.2}｜{}{}",
        hit.code,
        hit.name,
        hit.change_pct,
        hit.lots,
        hit.volume_multiple,
        hit.body_ratio,
        hit.sector,
        star
    )
}

fn push_tier(msg: &mut String, title: &str, shown: &[CandidateHit], total: usize) {
    msg.push_str(&format!("\n【{}】{} 檔\n", title, total));
    if shown.is_empty() {
        msg.push_str("（無）\n");
        return;
    }
    for hit in shown {
        msg.push_str(&format_hit_line(hit));
        msg.push('\n');
    }
    if total > shown.len() {
        msg.push_str(&format!("...及其他 {} 檔\n", total - shown.len()));
    }
}

/// Message for a run with hits.
///
/// `tier_a`/`tier_b` are the truncated report views; totals come from `hits`.
pub fn hits_message(
    signal_date: NaiveDate,
    hits: &ClassifiedHits,
    tier_a: &[CandidateHit],
    tier_b: &[CandidateHit],
    sectors: &SectorContext,
) -> String {
    let mut msg = format!("📈 {} {}\n", PATTERN_TITLE, signal_date.format("%Y-%m-%d"));

    if sectors.main_sectors.is_empty() {
        msg.push_str("主流族群：無\n");
    } else {
        let names: Vec<&str> = sectors.main_sectors.iter().map(String::as_str).collect();
        msg.push_str(&format!("主流族群：{}\n", names.join("、")));
    }

    push_tier(&mut msg, "A級 多頭排列", tier_a, hits.tier_a.len());
    push_tier(&mut msg, "B級", tier_b, hits.tier_b.len());
    msg.push_str("\n★ = 主流族群");
    msg
}

/// Message for a run where nothing survived.
pub fn no_hits_message(signal_date: NaiveDate) -> String {
    format!(
        "📭 {} {}\n今日無符合條件的標的",
        PATTERN_TITLE,
        signal_date.format("%Y-%m-%d")
    )
}

/// Notice for a run stopped by the market regime gate.
pub fn regime_blocked_message(date: NaiveDate, verdict: &RegimeVerdict) -> String {
    format!(
        "⛔ {} {}\n大盤未站上均線，暫停篩選\n{}",
        PATTERN_TITLE,
        date.format("%Y-%m-%d"),
        verdict.reason
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screener::classifier::SignalTier;
    use crate::screener::regime::{MaTrend, RegimeStatus};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 18).unwrap()
    }

    fn hit(code: &str, tier: SignalTier, is_main: bool) -> CandidateHit {
        CandidateHit {
            code: code.to_string(),
            name: "台積電".to_string(),
            change_pct: 8.0,
            volume_multiple: 3.0,
            lots: 2000.0,
            body_ratio: 0.6667,
            consolidation_range_pct: 0.05,
            breakout_pct: 0.02,
            close: 108.0,
            ma20: Some(100.0),
            ma60: Some(95.0),
            sector: "半導體業".to_string(),
            is_main_sector: is_main,
            tier,
        }
    }

    fn classified() -> ClassifiedHits {
        ClassifiedHits {
            tier_a: vec![hit("2330", SignalTier::A, true)],
            tier_b: vec![hit("2454", SignalTier::B, false), hit("2303", SignalTier::B, false)],
        }
    }

    #[test]
    fn test_scan_result_wire_names() {
        let result = ScanResult::from_hits(date(), &classified());
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["signalDate"], "2024-10-18");
        assert_eq!(value["stocks"], serde_json::json!(["2330", "2454", "2303"]));
        assert_eq!(value["stocksA"], serde_json::json!(["2330"]));
        assert_eq!(value["stocksB"], serde_json::json!(["2454", "2303"]));
    }

    #[test]
    fn test_empty_result() {
        let value = serde_json::to_value(ScanResult::empty(date())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "signalDate": "2024-10-18",
                "stocks": [],
                "stocksA": [],
                "stocksB": []
            })
        );
    }

    #[test]
    fn test_hit_line() {
        let line = format_hit_line(&hit("2330", SignalTier::A, true));
        assert_eq!(line, "2330 台積電｜8.00%｜量 2000張 (3.0倍)｜實體 0.67｜半導體業★");
    }

    #[test]
    fn test_hits_message_truncation_note() {
        let hits = classified();
        let sectors = SectorContext {
            main_sectors: ["半導體業".to_string()].into_iter().collect(),
            ..Default::default()
        };

        let msg = hits_message(date(), &hits, &hits.tier_a, &hits.tier_b[..1], &sectors);
        assert!(msg.contains(PATTERN_TITLE));
        assert!(msg.contains("2024-10-18"));
        assert!(msg.contains("主流族群：半導體業"));
        assert!(msg.contains("【B級】2 檔"));
        assert!(msg.contains("...及其他 1 檔"));
        assert!(!msg.contains("2303"));
    }

    #[test]
    fn test_no_hits_and_blocked_messages() {
        assert!(no_hits_message(date()).contains("今日無符合條件"));

        let verdict = RegimeVerdict {
            status: RegimeStatus::Bearish,
            latest_close: Some(95.0),
            moving_average: Some(100.0),
            previous_moving_average: Some(100.5),
            ma_trend: Some(MaTrend::Falling),
            reason: "close 95.00 not above MA60 100.00 (falling)".to_string(),
        };
        let msg = regime_blocked_message(date(), &verdict);
        assert!(msg.contains("暫停篩選"));
        assert!(msg.contains("not above MA60"));
    }

    #[test]
    fn test_json_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scan_result.json");
        let sink = JsonFileSink::new(&path);

        sink.write(&ScanResult::from_hits(date(), &classified())).unwrap();
        sink.write(&ScanResult::empty(date())).unwrap();

        let written: ScanResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, ScanResult::empty(date()));

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
