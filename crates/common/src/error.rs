//! Error types for TestScope

use thiserror::Error;

/// Result type alias using TestScope Error
pub type Result<T> = std::result::Result<T, Error>;

/// TestScope error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or oversized image payload. Surfaced to callers as a
    /// client error; never retried.
    #[error("Image decode error: {0}")]
    Decode(String),

    /// A similarity or change-detection step failed and the pipeline fell
    /// back to a degraded method. Absorbed internally; reflected only in
    /// the `method`/`note` fields of the output.
    #[error("Analysis degraded: {0}")]
    AnalysisDegraded(String),

    /// The external narrative generator failed or is unconfigured.
    /// Absorbed into the deterministic fallback narrator.
    #[error("Narrative generator unavailable: {0}")]
    NarrativeUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}
