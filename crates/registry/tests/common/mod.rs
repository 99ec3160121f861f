//! Shared fixtures for registry tests.

#![allow(dead_code)]

use bytes::Bytes;
use std::sync::Arc;
use stowage_core::checksum::layer_checksum;
use stowage_registry::Registry;
use stowage_storage::{ByteStream, FilesystemBackend, StorageResult};
use tempfile::TempDir;

/// A registry over a throwaway filesystem root.
pub struct TestRegistry {
    pub dir: TempDir,
    pub registry: Registry,
}

impl TestRegistry {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBackend::new(dir.path()).await.unwrap();
        Self {
            dir,
            registry: Registry::new(Arc::new(store)),
        }
    }
}

/// Metadata document for an image.
pub fn image_json(id: &str, parent: Option<&str>) -> Bytes {
    let mut doc = serde_json::json!({ "id": id, "os": "linux" });
    if let Some(parent) = parent {
        doc["parent"] = serde_json::Value::String(parent.to_string());
    }
    Bytes::from(serde_json::to_vec(&doc).unwrap())
}

/// Checksum a client would declare for this metadata and layer.
pub fn checksum_for(metadata: &[u8], layer: &[u8]) -> String {
    layer_checksum(metadata, layer).to_string()
}

/// A request body split into two chunks.
pub fn layer_body(layer: &[u8]) -> ByteStream {
    let middle = layer.len() / 2;
    let items: Vec<StorageResult<Bytes>> = vec![
        Ok(Bytes::copy_from_slice(&layer[..middle])),
        Ok(Bytes::copy_from_slice(&layer[middle..])),
    ];
    Box::pin(futures::stream::iter(items))
}

/// Register an image whose checksum matches `layer`.
pub async fn register(registry: &Registry, id: &str, parent: Option<&str>, layer: &[u8]) {
    let metadata = image_json(id, parent);
    let checksum = checksum_for(&metadata, layer);
    registry
        .put_image_json(id, metadata, Some(&checksum))
        .await
        .unwrap();
}

/// Register and upload an image.
pub async fn commit(registry: &Registry, id: &str, parent: Option<&str>, layer: &[u8]) {
    register(registry, id, parent, layer).await;
    registry.put_layer(id, layer_body(layer)).await.unwrap();
}
