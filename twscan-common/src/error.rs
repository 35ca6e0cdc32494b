//! Error types for the screener workspace.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias using the shared error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling a run from configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// A credential required by a mandatory collaborator is missing
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The `screener` section could not be deserialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error means the run cannot start at all.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MissingCredential(_))
    }
}
