//! Collaborator abstractions for market data.
//!
//! The screening core only talks to these traits. Concrete HTTP adapters
//! live next to this module; tests substitute in-memory implementations.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::{DailySnapshot, HistoricalBar, SectorMap};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Payload could not be mapped onto the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data not available for the requested symbol/date
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Supplies full-market daily snapshots.
///
/// A date with no data must come back as an empty snapshot, not an error;
/// that is how non-trading days are recognised.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Get the provider name (e.g., "twse")
    fn name(&self) -> &'static str;

    /// Fetch the snapshot for `date`, or the latest available one for `None`.
    async fn fetch_daily_snapshot(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<DailySnapshot, ProviderError>;
}

/// Supplies per-instrument daily history.
///
/// Bars are returned ascending by date with no duplicate dates.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch daily bars for `code` between `start` and `end` inclusive.
    async fn fetch_history(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalBar>, ProviderError>;
}

/// Supplies the code → sector mapping.
#[async_trait]
pub trait SectorInfoProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Fetch the mapping; an empty map is a valid answer.
    async fn fetch_sector_map(&self) -> Result<SectorMap, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Network("timeout".into()).is_recoverable());
        assert!(ProviderError::Http { status: 503, body: String::new() }.is_recoverable());
        assert!(ProviderError::Http { status: 429, body: String::new() }.is_recoverable());
        assert!(!ProviderError::Http { status: 404, body: String::new() }.is_recoverable());
        assert!(!ProviderError::Parse("bad json".into()).is_recoverable());
        assert!(!ProviderError::DataNotAvailable("no data".into()).is_recoverable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Http {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");

        let err = ProviderError::Network("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
