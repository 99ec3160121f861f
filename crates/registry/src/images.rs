//! Image registration, layer upload and ancestry.

use crate::error::{RegistryError, RegistryResult, not_found_as};
use crate::Registry;
use bytes::Bytes;
use futures::StreamExt;
use stowage_core::checksum::{Checksum, LayerHasher};
use stowage_core::image::{Ancestry, ImageMetadata};
use stowage_core::keys;
use stowage_storage::{ByteStream, StorageError};
use tracing::{info, instrument, warn};

/// Content of the in-progress mark. Only its presence matters.
const MARK_CONTENT: &[u8] = b"true";

/// Protocol state of an image, derived from its stored records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageState {
    Absent,
    Registered,
    Committed,
}

/// Stored metadata plus the declared checksum, if any.
#[derive(Clone, Debug)]
pub struct ImageJson {
    pub body: Bytes,
    pub checksum: Option<String>,
}

impl Registry {
    /// Derive the protocol state of an image.
    pub async fn image_state(&self, image_id: &str) -> RegistryResult<ImageState> {
        keys::validate_component("image id", image_id)?;
        if !self.store.exists(&keys::image_json(image_id)).await? {
            return Ok(ImageState::Absent);
        }
        if self.store.exists(&keys::image_mark(image_id)).await? {
            Ok(ImageState::Registered)
        } else {
            Ok(ImageState::Committed)
        }
    }

    /// Stream the layer of a registered or committed image.
    #[instrument(skip(self))]
    pub async fn get_layer(&self, image_id: &str) -> RegistryResult<ByteStream> {
        keys::validate_component("image id", image_id)?;
        if !self.store.exists(&keys::image_json(image_id)).await? {
            return Err(RegistryError::NotFound(format!("image {image_id}")));
        }
        self.store
            .get_stream(&keys::image_layer(image_id))
            .await
            .map_err(not_found_as(format!("layer of image {image_id}")))
    }

    /// Store a layer and verify it against the registered checksum.
    ///
    /// The layer is written before it is verified. On a mismatch the written
    /// bytes stay in place and the image remains registered.
    #[instrument(skip(self, body))]
    pub async fn put_layer(&self, image_id: &str, body: ByteStream) -> RegistryResult<()> {
        keys::validate_component("image id", image_id)?;

        let metadata = self
            .store
            .get(&keys::image_json(image_id))
            .await
            .map_err(not_found_as(format!("image {image_id}")))?;
        let declared = self
            .store
            .get(&keys::image_checksum(image_id))
            .await
            .map_err(not_found_as(format!("checksum of image {image_id}")))?;

        let layer_key = keys::image_layer(image_id);
        let mark_key = keys::image_mark(image_id);
        if self.store.exists(&layer_key).await? && !self.store.exists(&mark_key).await? {
            return Err(RegistryError::Conflict(format!(
                "image {image_id} already exists"
            )));
        }

        let declared = String::from_utf8_lossy(&declared).into_owned();
        let checksum = Checksum::parse(declared.trim())
            .map_err(|e| RegistryError::BadRequest(e.to_string()))?;
        let algorithm = checksum
            .algorithm()
            .map_err(|e| RegistryError::BadRequest(e.to_string()))?;

        let written = self.store.put_stream(&layer_key, body).await?;

        let mut hasher = LayerHasher::new(algorithm, &metadata);
        let mut stored = self.store.get_stream(&layer_key).await?;
        while let Some(chunk) = stored.next().await {
            hasher.update(&chunk?);
        }
        let computed = hasher.finalize_hex();

        if !checksum.matches(&computed) {
            warn!(
                image_id = %image_id,
                expected = %checksum,
                computed = %computed,
                "layer checksum mismatch"
            );
            return Err(RegistryError::ChecksumMismatch {
                expected: checksum.to_string(),
                actual: format!("{algorithm}:{computed}"),
            });
        }

        match self.store.remove(&mark_key).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(image_id = %image_id, size = written, "layer committed");
        Ok(())
    }

    /// Fetch stored metadata and its declared checksum.
    #[instrument(skip(self))]
    pub async fn get_image_json(&self, image_id: &str) -> RegistryResult<ImageJson> {
        keys::validate_component("image id", image_id)?;
        let body = self
            .store
            .get(&keys::image_json(image_id))
            .await
            .map_err(not_found_as(format!("image {image_id}")))?;

        let checksum = match self.store.get(&keys::image_checksum(image_id)).await {
            Ok(raw) => Some(String::from_utf8_lossy(&raw).trim().to_string()),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(ImageJson { body, checksum })
    }

    /// Register image metadata.
    ///
    /// Every input is validated and the ancestry computed before anything is
    /// written, so a rejected registration leaves no records behind.
    #[instrument(skip(self, body, checksum))]
    pub async fn put_image_json(
        &self,
        image_id: &str,
        body: Bytes,
        checksum: Option<&str>,
    ) -> RegistryResult<Ancestry> {
        keys::validate_component("image id", image_id)?;

        let metadata = ImageMetadata::from_json(&body)?;
        if metadata.id != image_id {
            return Err(RegistryError::BadRequest(format!(
                "image id in body ({}) does not match {image_id}",
                metadata.id
            )));
        }

        let checksum = checksum
            .ok_or_else(|| RegistryError::BadRequest("missing image checksum".to_string()))?;
        let parsed = Checksum::parse(checksum.trim())?;
        parsed.algorithm()?;

        if self.store.exists(&keys::image_json(image_id)).await?
            && !self.store.exists(&keys::image_mark(image_id)).await?
        {
            return Err(RegistryError::Conflict(format!(
                "image {image_id} already exists"
            )));
        }

        let ancestry = match &metadata.parent {
            None => Ancestry::root(image_id),
            Some(parent) => {
                keys::validate_component("parent id", parent)?;
                if !self.store.exists(&keys::image_json(parent)).await? {
                    return Err(RegistryError::BadRequest(format!(
                        "parent image {parent} not found"
                    )));
                }
                let parent_ancestry = self
                    .store
                    .get(&keys::image_ancestry(parent))
                    .await
                    .map_err(not_found_as(format!("ancestry of image {parent}")))?;
                Ancestry::descend(image_id, &Ancestry::from_json(&parent_ancestry)?)
            }
        };
        let ancestry_json = ancestry.to_json()?;

        self.store
            .put(
                &keys::image_checksum(image_id),
                Bytes::from(parsed.to_string()),
            )
            .await?;
        self.store
            .put(&keys::image_mark(image_id), Bytes::from_static(MARK_CONTENT))
            .await?;
        self.store.put(&keys::image_json(image_id), body).await?;
        self.store
            .put(&keys::image_ancestry(image_id), Bytes::from(ancestry_json))
            .await?;

        info!(
            image_id = %image_id,
            parent = metadata.parent.as_deref().unwrap_or(""),
            depth = ancestry.len(),
            "image registered"
        );
        Ok(ancestry)
    }

    /// Fetch the ancestry of an image, newest first.
    #[instrument(skip(self))]
    pub async fn get_ancestry(&self, image_id: &str) -> RegistryResult<Ancestry> {
        keys::validate_component("image id", image_id)?;
        let raw = self
            .store
            .get(&keys::image_ancestry(image_id))
            .await
            .map_err(not_found_as(format!("image {image_id}")))?;
        Ok(Ancestry::from_json(&raw)?)
    }
}
