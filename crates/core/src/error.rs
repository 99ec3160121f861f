//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("checksum algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid image json: {0}")]
    InvalidImageJson(String),

    #[error("missing key `id` in image json")]
    MissingImageId,

    #[error("invalid ancestry: {0}")]
    InvalidAncestry(String),

    #[error("invalid image record: {0}")]
    InvalidImageRecord(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
