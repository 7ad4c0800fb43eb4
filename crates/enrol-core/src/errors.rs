//! Cross-cutting error types.
//!
//! Storage, provider and engine errors live in `enrol-engine`; configuration
//! errors live in `enrol-config`. The CLI converges everything into `anyhow`.

use thiserror::Error;

/// Errors that can be raised while building core values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier was zero, unparsable, or otherwise unusable.
    #[error("Invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },
}
