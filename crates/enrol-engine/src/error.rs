//! Error types for enrolment computation.
//!
//! Recoverable conditions (unknown provider, malformed blobs, failing
//! providers) are absorbed where they happen and never reach these types.
//! What remains is invalid caller input and collaborator failures.

use enrol_core::CourseId;
use thiserror::Error;

/// Errors raised by the persistence and scheduling collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing document could not be (de)serialized.
    #[error("Store document is invalid: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors a provider reports from its own algorithm.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not implement the requested operation.
    #[error("Provider '{provider}' does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    /// An upstream system the provider depends on could not answer.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller passed an unusable argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The course does not exist in the content collaborator.
    #[error("Course not found: {0}")]
    CourseNotFound(CourseId),

    /// An operation needed a provider that is not registered.
    #[error("Enrolment provider not registered: {0}")]
    ProviderNotFound(String),

    /// A provider failed an explicitly requested operation.
    #[error("Provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
