//! S3-compatible storage backend using AWS SDK.

use crate::buffer::BufferDir;
use crate::credentials::{CredentialProvider, CredentialSource};
use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore, normalize_key};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{instrument, warn};

/// Delimiter used to fold keys into groupings when listing.
const DELIMITER: &str = "/";

const DEFAULT_REGION: &str = "us-east-1";

/// Per-request config override carrying the current credentials.
fn signed_with(credentials: &Credentials) -> aws_sdk_s3::config::Builder {
    aws_sdk_s3::config::Builder::new().credentials_provider(credentials.clone())
}

fn map_s3_operation_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

/// S3-compatible object store using AWS SDK.
///
/// Every request holds a read guard on the credential provider while it is in
/// flight. Streamed uploads are staged in a [`BufferDir`] slot so the object
/// store receives a known content length.
pub struct S3Backend {
    client: Client,
    bucket: String,
    /// Key prefix inside the bucket, without leading or trailing `/`.
    prefix: Option<String>,
    credentials: Arc<CredentialProvider>,
    buffer: BufferDir,
    refresh_task: JoinHandle<()>,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("buffer", &self.buffer.root())
            .finish_non_exhaustive()
    }
}

impl Drop for S3Backend {
    fn drop(&mut self) {
        self.refresh_task.abort();
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// Fetches the initial credentials, prepares the buffer directory and
    /// starts the background credential refresh.
    ///
    /// # Arguments
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`).
    ///   Required for MinIO.
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        root_path: Option<String>,
        buffer_dir: impl AsRef<Path>,
        source: Arc<dyn CredentialSource>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if bucket.trim().is_empty() {
            return Err(StorageError::Config("s3 config requires a bucket".to_string()));
        }

        let credentials = Arc::new(CredentialProvider::new(source).await?);
        let buffer = BufferDir::new(buffer_dir).await?;

        let resolved_region = region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region))
            .credentials_provider(credentials.current().await.clone());

        let normalized_endpoint = endpoint.map(|endpoint_url| {
            // Bare host:port endpoints (e.g., "minio:9000") default to http.
            let endpoint_lower = endpoint_url.to_lowercase();
            if endpoint_lower.starts_with("http://") || endpoint_lower.starts_with("https://") {
                endpoint_url
            } else {
                format!("http://{endpoint_url}")
            }
        });

        if let Some(endpoint_url) = &normalized_endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);

            // Plain HTTP endpoints do not need native trust roots.
            if endpoint_url.to_ascii_lowercase().starts_with("http://") {
                s3_config_builder =
                    s3_config_builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }

        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        let prefix = root_path
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());

        let refresh_task = credentials.spawn_refresh_loop();

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix,
            credentials,
            buffer,
            refresh_task,
        })
    }

    /// The credential provider backing this backend.
    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        &self.credentials
    }

    /// Full object key for a normalized logical key.
    fn full_key(&self, key: &str) -> String {
        match (&self.prefix, key.is_empty()) {
            (Some(prefix), true) => prefix.clone(),
            (Some(prefix), false) => format!("{prefix}/{key}"),
            (None, _) => key.to_string(),
        }
    }

    /// Listing prefix for everything below a normalized logical key.
    fn dir_prefix(&self, key: &str) -> String {
        let full = self.full_key(key);
        if full.is_empty() {
            full
        } else {
            format!("{full}/")
        }
    }

    /// Strip the configured prefix from a full object key.
    fn strip_prefix(&self, full_key: &str) -> String {
        match &self.prefix {
            Some(prefix) => {
                let prefix_with_slash = format!("{prefix}/");
                full_key
                    .strip_prefix(&prefix_with_slash)
                    .unwrap_or(full_key)
                    .to_string()
            }
            None => full_key.to_string(),
        }
    }

    /// Convert an AWS SDK error to StorageError, mapping 404 to NotFound.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err
            && service_err.raw().status().as_u16() == 404
        {
            return StorageError::NotFound(key.to_string());
        }
        map_s3_operation_error(err)
    }

    /// Every object key under a directory prefix, across all pages.
    async fn list_recursive(&self, dir_prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let credentials = self.credentials.current().await;
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(dir_prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .customize()
                .config_override(signed_with(&credentials))
                .send()
                .await
                .map_err(map_s3_operation_error)?;

            keys.extend(output.contents().iter().filter_map(|obj| obj.key()).map(str::to_string));

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }

    async fn delete_object(&self, full_key: &str) -> StorageResult<()> {
        let credentials = self.credentials.current().await;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(full_key)
            .customize()
            .config_override(signed_with(&credentials))
            .send()
            .await
            .map_err(map_s3_operation_error)?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let full_key = self.full_key(normalize_key(key)?);
        let credentials = self.credentials.current().await;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .customize()
            .config_override(signed_with(&credentials))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();

        Ok(bytes)
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let full_key = self.full_key(normalize_key(key)?);
        let credentials = self.credentials.current().await;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(data.into())
            .customize()
            .config_override(signed_with(&credentials))
            .send()
            .await
            .map_err(map_s3_operation_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let full_key = self.full_key(normalize_key(key)?);
        let credentials = self.credentials.current().await;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .customize()
            .config_override(signed_with(&credentials))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let reader_stream = ReaderStream::new(output.body.into_async_read());
        let stream = reader_stream.map(|result| result.map_err(StorageError::Io));

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, stream), fields(backend = "s3"))]
    async fn put_stream(&self, key: &str, mut stream: ByteStream) -> StorageResult<u64> {
        let normalized = normalize_key(key)?;
        let full_key = self.full_key(normalized);
        let slot = self.buffer.reserve(normalized)?;

        let mut size = 0u64;
        {
            let mut file = fs::File::create(slot.path()).await?;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                size += chunk.len() as u64;
            }
            file.flush().await?;
        }

        let body = S3ByteStream::from_path(slot.path())
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;
        let content_length = i64::try_from(size)
            .map_err(|_| StorageError::Config(format!("object too large: {size} bytes")))?;

        let credentials = self.credentials.current().await;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .content_length(content_length)
            .body(body)
            .customize()
            .config_override(signed_with(&credentials))
            .send()
            .await
            .map_err(map_s3_operation_error)?;
        drop(credentials);
        drop(slot);

        Ok(size)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let dir_prefix = self.dir_prefix(normalize_key(prefix)?);
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let credentials = self.credentials.current().await;
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&dir_prefix)
                .delimiter(DELIMITER);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .customize()
                .config_override(signed_with(&credentials))
                .send()
                .await
                .map_err(map_s3_operation_error)?;

            for obj_key in output.contents().iter().filter_map(|obj| obj.key()) {
                // A zero-length name is the grouping marker itself.
                if obj_key.len() > dir_prefix.len() {
                    results.push(self.strip_prefix(obj_key));
                }
            }
            for common in output.common_prefixes().iter().filter_map(|p| p.prefix()) {
                results.push(self.strip_prefix(common.trim_end_matches('/')));
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        results.sort();
        results.dedup();
        Ok(results)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let full_key = self.full_key(normalize_key(key)?);
        let credentials = self.credentials.current().await;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .customize()
            .config_override(signed_with(&credentials))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err
                    && service_err.raw().status().as_u16() == 404
                {
                    return Ok(false);
                }
                Err(map_s3_operation_error(err))
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn remove(&self, key: &str) -> StorageResult<()> {
        let normalized = normalize_key(key)?;
        if normalized.is_empty() {
            return Err(StorageError::InvalidKey(
                "cannot remove the storage root".to_string(),
            ));
        }

        // delete_object succeeds on missing keys, so check first.
        if !self.exists(normalized).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.delete_object(&self.full_key(normalized)).await
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn remove_all(&self, prefix: &str) -> StorageResult<()> {
        let normalized = normalize_key(prefix)?;
        let keys = self.list_recursive(&self.dir_prefix(normalized)).await?;

        for full_key in &keys {
            if let Err(e) = self.delete_object(full_key).await {
                warn!(key = %full_key, error = %e, "failed to delete object, continuing");
            }
        }

        // The grouping marker itself; never the root.
        if !normalized.is_empty() {
            self.delete_object(&self.full_key(normalized)).await?;
        }
        Ok(())
    }
}
