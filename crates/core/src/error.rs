//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown attachment kind: {0}")]
    UnknownAttachmentKind(String),

    #[error("invalid SQL identifier: {0}")]
    InvalidIdentifier(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
