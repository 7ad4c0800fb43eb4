//! Configuration error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn must_be_positive(field: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        }
    }
}
