//! Registry error types and their classification.

use stowage_storage::StorageError;
use thiserror::Error;

/// Registry operation errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] stowage_core::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure classes surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    BackendUnavailable,
    Internal,
}

impl RegistryError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::BadRequest(_) | Self::ChecksumMismatch { .. } => ErrorKind::BadRequest,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => ErrorKind::NotFound,
                StorageError::UploadInProgress(_) => ErrorKind::Conflict,
                StorageError::Credentials(_) | StorageError::S3(_) => {
                    ErrorKind::BackendUnavailable
                }
                StorageError::Io(_) | StorageError::InvalidKey(_) | StorageError::Config(_) => {
                    ErrorKind::Internal
                }
            },
            Self::Core(e) => match e {
                stowage_core::Error::InvalidAncestry(_) | stowage_core::Error::Serialization(_) => {
                    ErrorKind::Internal
                }
                _ => ErrorKind::BadRequest,
            },
            Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error means a buffered upload to the same key is running.
    pub fn is_upload_in_progress(&self) -> bool {
        matches!(self, Self::Storage(StorageError::UploadInProgress(_)))
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Map a storage `NotFound` to a registry `NotFound` naming the entity.
pub(crate) fn not_found_as(what: impl Into<String>) -> impl FnOnce(StorageError) -> RegistryError {
    let what = what.into();
    move |e| match e {
        StorageError::NotFound(_) => RegistryError::NotFound(what),
        other => RegistryError::Storage(other),
    }
}
