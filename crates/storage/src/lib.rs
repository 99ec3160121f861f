//! Object storage abstraction and backends for stowage.
//!
//! This crate provides:
//! - The [`ObjectStore`] capability set shared by every backend
//! - A local filesystem backend
//! - An S3-compatible backend with credential refresh and buffered uploads

pub mod backends;
pub mod buffer;
pub mod credentials;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use buffer::{BufferDir, BufferSlot};
pub use credentials::{CredentialProvider, CredentialSource, DefaultChainSource, StaticSource};
pub use error::{StorageError, StorageResult};
pub use traits::{ByteStream, ObjectStore};

use std::sync::Arc;
use stowage_core::config::StorageConfig;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Local { root_path } => {
            let backend = FilesystemBackend::new(root_path).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            bucket,
            region,
            endpoint,
            root_path,
            buffer_dir,
            access_key,
            secret_key,
            force_path_style,
        } => {
            let source: Arc<dyn CredentialSource> = match (access_key, secret_key) {
                (Some(access_key), Some(secret_key)) => {
                    Arc::new(StaticSource::new(access_key, secret_key))
                }
                _ => Arc::new(DefaultChainSource::new(
                    region.clone().unwrap_or_else(|| "us-east-1".to_string()),
                )),
            };
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                root_path.clone(),
                buffer_dir,
                source,
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}
