//! Configuration validation.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{Config, HttpConfig, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Shorthand for an `InvalidValue` error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of errors into a single result.
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Reject non-finite or negative numbers.
pub fn check_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::invalid(field, "must be a finite, non-negative number"));
    }
    Ok(())
}

/// Reject zero-length windows and counts.
pub fn check_positive(field: &str, value: usize) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::invalid(field, "must be greater than 0"));
    }
    Ok(())
}

impl Config {
    /// Validate the entire configuration.
    ///
    /// `require_notifier` is set when the run will publish to Telegram; the
    /// bot token and chat id are then mandatory.
    pub fn validate_for_run(&self, require_notifier: bool) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Err(e) = self.http.validate() {
            errors.push(e);
        }

        if self.output.result_path.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "output.result_path".into(),
            });
        }

        if require_notifier {
            if self.telegram_bot_token().is_none() {
                errors.push(ValidationError::MissingField {
                    field: "secrets.telegram.bot_token".into(),
                });
            }
            if self.telegram_chat_id().is_none() {
                errors.push(ValidationError::MissingField {
                    field: "secrets.telegram.chat_id".into(),
                });
            }
        }

        ValidationError::collect(errors)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_level",
                format!("must be one of {:?}", valid_levels),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_format",
                format!("must be one of {:?}", valid_formats),
            ));
        }

        Ok(())
    }
}

impl Validate for HttpConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::invalid("http.timeout_secs", "must be greater than 0"));
        }
        if self.retry_count == 0 {
            return Err(ValidationError::invalid(
                "http.retry_count",
                "must allow at least one attempt",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid_without_notifier() {
        let config = Config::default();
        assert!(config.validate_for_run(false).is_ok());
    }

    #[test]
    fn test_missing_telegram_credentials() {
        let config = Config::default();
        let err = config.validate_for_run(true).unwrap_err();
        match err {
            ValidationError::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_telegram_credentials_present() {
        let mut config = Config::default();
        config.secrets.telegram.bot_token = Some("123:abc".into());
        config.secrets.telegram.chat_id = Some("-100200".into());
        assert!(config.validate_for_run(true).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ObservabilityConfig::default();
        config.log_level = "verbose".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_rejected() {
        let mut http = HttpConfig::default();
        http.retry_count = 0;
        assert!(http.validate().is_err());
    }

    #[test]
    fn test_numeric_checks() {
        assert!(check_non_negative("x", 0.5).is_ok());
        assert!(check_non_negative("x", -0.1).is_err());
        assert!(check_non_negative("x", f64::NAN).is_err());
        assert!(check_positive("n", 1).is_ok());
        assert!(check_positive("n", 0).is_err());
    }
}
