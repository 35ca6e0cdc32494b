//! Screener configuration module.
//!
//! Every threshold of the pipeline is a named value here. The whole struct is
//! read from the `screener` section of the config file; absent fields keep
//! their defaults.

use serde::{Deserialize, Serialize};
use twscan_common::validation::{check_non_negative, check_positive};
use twscan_common::{Config, Validate, ValidationError, ValidationResult};

// ============================================================================
// Main Screener Configuration
// ============================================================================

/// Configuration for the volume-breakout screener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Market regime gate
    #[serde(default)]
    pub regime: RegimeConfig,

    /// Snapshot-only candle filter
    #[serde(default)]
    pub prefilter: PrefilterConfig,

    /// History-based volume and breakout confirmation
    #[serde(default)]
    pub breakout: BreakoutConfig,

    /// Sector rotation scoring
    #[serde(default)]
    pub sector: SectorConfig,

    /// Tiering and report view
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl ScreenerConfig {
    /// Read the `screener` section of the application config.
    ///
    /// A missing section yields the defaults.
    pub fn from_config(config: &Config) -> twscan_common::Result<Self> {
        let screener = match &config.screener {
            Some(value) => serde_json::from_value(value.clone())?,
            None => Self::default(),
        };
        screener.validate()?;
        Ok(screener)
    }
}

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        let errors: Vec<ValidationError> = [
            self.regime.validate(),
            self.prefilter.validate(),
            self.breakout.validate(),
            self.sector.validate(),
            self.classifier.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        ValidationError::collect(errors)
    }
}

// ============================================================================
// Regime Configuration
// ============================================================================

/// Broad-market moving-average gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Market proxy symbol (TAIEX)
    #[serde(default = "default_proxy_symbol")]
    pub proxy_symbol: String,

    /// Moving-average window in sessions
    #[serde(default = "default_ma_window")]
    pub ma_window: usize,

    /// Calendar days of proxy history to request
    #[serde(default = "default_history_calendar_days")]
    pub history_calendar_days: i64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            proxy_symbol: default_proxy_symbol(),
            ma_window: default_ma_window(),
            history_calendar_days: default_history_calendar_days(),
        }
    }
}

impl Validate for RegimeConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.proxy_symbol.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "screener.regime.proxy_symbol".into(),
            });
        }
        check_positive("screener.regime.ma_window", self.ma_window)?;
        check_history_days("screener.regime.history_calendar_days", self.history_calendar_days)
    }
}

fn default_proxy_symbol() -> String {
    "^TWII".to_string()
}

fn default_ma_window() -> usize {
    60
}

fn default_history_calendar_days() -> i64 {
    // 60 sessions need roughly 90 calendar days; leave room for holidays
    120
}

fn check_history_days(field: &str, days: i64) -> ValidationResult<()> {
    if days <= 0 {
        return Err(ValidationError::invalid(field, "must be greater than 0"));
    }
    Ok(())
}

// ============================================================================
// Prefilter Configuration
// ============================================================================

/// Same-day candle shape thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefilterConfig {
    /// Minimum percent change versus the previous close
    #[serde(default = "default_min_change_pct")]
    pub min_change_pct: f64,

    /// Minimum body / range ratio
    #[serde(default = "default_min_body_ratio")]
    pub min_body_ratio: f64,

    /// Minimum traded lots (1 lot = 1000 shares)
    #[serde(default = "default_min_lots")]
    pub min_lots: f64,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            min_change_pct: default_min_change_pct(),
            min_body_ratio: default_min_body_ratio(),
            min_lots: default_min_lots(),
        }
    }
}

impl Validate for PrefilterConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.min_change_pct.is_finite() {
            return Err(ValidationError::invalid(
                "screener.prefilter.min_change_pct",
                "must be a finite number",
            ));
        }
        check_non_negative("screener.prefilter.min_body_ratio", self.min_body_ratio)?;
        check_non_negative("screener.prefilter.min_lots", self.min_lots)
    }
}

fn default_min_change_pct() -> f64 {
    3.5
}

fn default_min_body_ratio() -> f64 {
    0.60
}

fn default_min_lots() -> f64 {
    1500.0
}

// ============================================================================
// Breakout Configuration
// ============================================================================

/// Volume surge and consolidation breakout thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutConfig {
    /// Today's volume must exceed this multiple of the 5-session average
    #[serde(default = "default_volume_multiple")]
    pub volume_multiple: f64,

    /// Sessions forming the consolidation box
    #[serde(default = "default_consolidation_window")]
    pub consolidation_window: usize,

    /// Sessions required beyond the consolidation window
    #[serde(default = "default_extra_sessions")]
    pub extra_sessions: usize,

    /// Maximum (high - low) / low of the box
    #[serde(default = "default_max_range_pct")]
    pub max_range_pct: f64,

    /// Minimum close above the box high, as a fraction
    #[serde(default = "default_breakout_pct")]
    pub breakout_pct: f64,

    /// Also require today's volume above the plain 5-session average
    #[serde(default = "default_true")]
    pub require_volume_above_ma5: bool,

    /// Sessions of the volume baseline
    #[serde(default = "default_volume_ma_window")]
    pub volume_ma_window: usize,

    /// Short close moving average used for tiering
    #[serde(default = "default_ma_short")]
    pub ma_short: usize,

    /// Long close moving average used for tiering
    #[serde(default = "default_ma_long")]
    pub ma_long: usize,

    /// Calendar days of instrument history to request
    #[serde(default = "default_history_calendar_days")]
    pub history_calendar_days: i64,
}

impl BreakoutConfig {
    /// Sessions of history needed before a candidate is evaluated at all.
    pub fn min_sessions(&self) -> usize {
        self.consolidation_window + self.extra_sessions
    }
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            volume_multiple: default_volume_multiple(),
            consolidation_window: default_consolidation_window(),
            extra_sessions: default_extra_sessions(),
            max_range_pct: default_max_range_pct(),
            breakout_pct: default_breakout_pct(),
            require_volume_above_ma5: true,
            volume_ma_window: default_volume_ma_window(),
            ma_short: default_ma_short(),
            ma_long: default_ma_long(),
            history_calendar_days: default_history_calendar_days(),
        }
    }
}

impl Validate for BreakoutConfig {
    fn validate(&self) -> ValidationResult<()> {
        check_non_negative("screener.breakout.volume_multiple", self.volume_multiple)?;
        check_positive("screener.breakout.consolidation_window", self.consolidation_window)?;
        check_non_negative("screener.breakout.max_range_pct", self.max_range_pct)?;
        check_non_negative("screener.breakout.breakout_pct", self.breakout_pct)?;
        check_positive("screener.breakout.volume_ma_window", self.volume_ma_window)?;
        check_positive("screener.breakout.ma_short", self.ma_short)?;
        check_positive("screener.breakout.ma_long", self.ma_long)?;
        if self.volume_ma_window > self.min_sessions() {
            return Err(ValidationError::invalid(
                "screener.breakout.volume_ma_window",
                "must not exceed consolidation_window + extra_sessions",
            ));
        }
        check_history_days(
            "screener.breakout.history_calendar_days",
            self.history_calendar_days,
        )
    }
}

fn default_true() -> bool {
    true
}

fn default_volume_multiple() -> f64 {
    2.0
}

fn default_consolidation_window() -> usize {
    20
}

fn default_extra_sessions() -> usize {
    6
}

fn default_max_range_pct() -> f64 {
    0.10
}

fn default_breakout_pct() -> f64 {
    0.01
}

fn default_volume_ma_window() -> usize {
    5
}

fn default_ma_short() -> usize {
    20
}

fn default_ma_long() -> usize {
    60
}

// ============================================================================
// Sector Configuration
// ============================================================================

/// Sector rotation scoring and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorConfig {
    /// Return (%) at or above which a member counts as "up"
    #[serde(default = "default_up_threshold_pct")]
    pub up_threshold_pct: f64,

    /// Weight of the up ratio in the sector score
    #[serde(default = "default_up_ratio_weight")]
    pub up_ratio_weight: f64,

    /// Sectors with fewer members are not ranked
    #[serde(default = "default_min_members")]
    pub min_members: usize,

    /// Sectors taken from the top of each day's ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Trading days replayed
    #[serde(default = "default_window_days")]
    pub window_days: usize,

    /// Appearances in the top N needed to count as main
    #[serde(default = "default_persistence")]
    pub persistence: usize,

    /// Calendar days checked at most while looking for trading days
    #[serde(default = "default_lookback_cap_days")]
    pub lookback_cap_days: usize,
}

impl Default for SectorConfig {
    fn default() -> Self {
        Self {
            up_threshold_pct: default_up_threshold_pct(),
            up_ratio_weight: default_up_ratio_weight(),
            min_members: default_min_members(),
            top_n: default_top_n(),
            window_days: default_window_days(),
            persistence: default_persistence(),
            lookback_cap_days: default_lookback_cap_days(),
        }
    }
}

impl Validate for SectorConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.up_threshold_pct.is_finite() {
            return Err(ValidationError::invalid(
                "screener.sector.up_threshold_pct",
                "must be a finite number",
            ));
        }
        check_non_negative("screener.sector.up_ratio_weight", self.up_ratio_weight)?;
        check_positive("screener.sector.min_members", self.min_members)?;
        check_positive("screener.sector.top_n", self.top_n)?;
        check_positive("screener.sector.window_days", self.window_days)?;
        check_positive("screener.sector.persistence", self.persistence)?;
        check_positive("screener.sector.lookback_cap_days", self.lookback_cap_days)?;
        if self.persistence > self.window_days {
            return Err(ValidationError::invalid(
                "screener.sector.persistence",
                "must not exceed window_days",
            ));
        }
        Ok(())
    }
}

fn default_up_threshold_pct() -> f64 {
    2.0
}

fn default_up_ratio_weight() -> f64 {
    2.0
}

fn default_min_members() -> usize {
    5
}

fn default_top_n() -> usize {
    5
}

fn default_window_days() -> usize {
    5
}

fn default_persistence() -> usize {
    3
}

fn default_lookback_cap_days() -> usize {
    30
}

// ============================================================================
// Classifier Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Maximum hits per tier in the published report
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            report_limit: default_report_limit(),
        }
    }
}

impl Validate for ClassifierConfig {
    fn validate(&self) -> ValidationResult<()> {
        check_positive("screener.classifier.report_limit", self.report_limit)
    }
}

fn default_report_limit() -> usize {
    30
}

// ============================================================================
// Tests
// ============================================================================
