//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads and writes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Object store abstraction shared by every backend.
///
/// Keys are forward-slash delimited logical paths. A leading `/` is ignored and
/// the empty key names the backend root. Operations on distinct keys may run
/// concurrently.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object, creating any intermediate grouping. Overwrites silently.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Write a stream of unknown length to an object, returning the bytes written.
    async fn put_stream(&self, key: &str, stream: ByteStream) -> StorageResult<u64>;

    /// List the immediate children (entries and sub-groupings) under a prefix.
    ///
    /// Returned keys are full logical keys, sorted. A missing prefix lists as empty.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object. Fails with `NotFound` if it does not exist.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Recursively delete everything under a prefix.
    ///
    /// Removing the root clears its contents but keeps the root itself.
    async fn remove_all(&self, prefix: &str) -> StorageResult<()>;
}

/// Normalize a logical key.
///
/// Strips leading and trailing `/` and rejects empty, relative or
/// backslash-carrying segments. Returns the empty string for the root.
pub(crate) fn normalize_key(key: &str) -> StorageResult<&str> {
    let trimmed = key.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(trimmed);
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {key}"
            )));
        }
    }
    Ok(trimmed)
}

/// Join a normalized prefix and a child name into a logical key.
pub(crate) fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
