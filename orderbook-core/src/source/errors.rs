//! Source layer error types.

use thiserror::Error;

/// Error types for order book sources
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SourceError {
    #[error("Snapshot fetch error: {0}")]
    Snapshot(String),

    #[error("Payload conversion error: {0}")]
    Conversion(String),

    #[error("On-demand snapshot loading is not supported by this source")]
    Unsupported,
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;
