//! twscan common - Shared configuration, errors and logging for the screener.
//!
//! This crate provides:
//! - Configuration types, loading and environment overrides
//! - Configuration validation
//! - Error types
//! - Logging setup
//! - Small text helpers (message splitting, truncation)

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    Config, HttpConfig, NotificationConfig, ObservabilityConfig, OutputConfig, SecretsConfig,
    TelegramSecrets,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

