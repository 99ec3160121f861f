//! Tags, repository deletion and repository image lists.

use crate::error::{RegistryError, RegistryResult, not_found_as};
use crate::Registry;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use stowage_core::image::validate_image_records;
use stowage_core::keys;
use stowage_storage::StorageError;
use tracing::{debug, info, instrument, warn};

fn validate_repository(namespace: &str, repository: &str) -> RegistryResult<()> {
    keys::validate_component("namespace", namespace)?;
    keys::validate_component("repository", repository)?;
    Ok(())
}

impl Registry {
    /// All tags of a repository, by name.
    #[instrument(skip(self))]
    pub async fn list_tags(
        &self,
        namespace: &str,
        repository: &str,
    ) -> RegistryResult<BTreeMap<String, String>> {
        validate_repository(namespace, repository)?;
        let entries = self
            .store
            .list(&keys::repository(namespace, repository))
            .await?;
        if entries.is_empty() {
            return Err(RegistryError::NotFound(format!(
                "repository {namespace}/{repository}"
            )));
        }

        let mut tags = BTreeMap::new();
        for key in &entries {
            let Some(name) = keys::tag_name(key) else {
                continue;
            };
            match self.store.get(key).await {
                Ok(value) => {
                    tags.insert(name.to_string(), String::from_utf8_lossy(&value).into_owned());
                }
                // Deleted between list and get.
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(tags)
    }

    /// The image id a tag points at.
    #[instrument(skip(self))]
    pub async fn get_tag(
        &self,
        namespace: &str,
        repository: &str,
        tag: &str,
    ) -> RegistryResult<String> {
        validate_repository(namespace, repository)?;
        keys::validate_component("tag", tag)?;
        let value = self
            .store
            .get(&keys::tag(namespace, repository, tag))
            .await
            .map_err(not_found_as(format!("tag {tag}")))?;
        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    /// Point a tag at an image. The image metadata must exist.
    #[instrument(skip(self))]
    pub async fn set_tag(
        &self,
        namespace: &str,
        repository: &str,
        tag: &str,
        image_id: &str,
    ) -> RegistryResult<()> {
        validate_repository(namespace, repository)?;
        keys::validate_component("tag", tag)?;
        keys::validate_component("image id", image_id)?;

        if !self.store.exists(&keys::image_json(image_id)).await? {
            return Err(RegistryError::NotFound(format!("image {image_id}")));
        }
        self.store
            .put(
                &keys::tag(namespace, repository, tag),
                Bytes::from(image_id.to_string()),
            )
            .await?;
        info!(namespace, repository, tag, image_id, "tag set");
        Ok(())
    }

    /// Remove a tag.
    #[instrument(skip(self))]
    pub async fn delete_tag(
        &self,
        namespace: &str,
        repository: &str,
        tag: &str,
    ) -> RegistryResult<()> {
        validate_repository(namespace, repository)?;
        keys::validate_component("tag", tag)?;
        self.store
            .remove(&keys::tag(namespace, repository, tag))
            .await
            .map_err(not_found_as(format!("tag {tag}")))?;
        info!(namespace, repository, tag, "tag deleted");
        Ok(())
    }

    /// Remove every key of a repository.
    #[instrument(skip(self))]
    pub async fn delete_repository(&self, namespace: &str, repository: &str) -> RegistryResult<()> {
        validate_repository(namespace, repository)?;
        let prefix = keys::repository(namespace, repository);
        if self.store.list(&prefix).await?.is_empty() {
            return Err(RegistryError::NotFound(format!(
                "repository {namespace}/{repository}"
            )));
        }
        self.store.remove_all(&prefix).await?;
        info!(namespace, repository, "repository deleted");
        Ok(())
    }

    /// Image records associated with a repository.
    ///
    /// A missing or unreadable list is treated as empty.
    #[instrument(skip(self))]
    pub async fn list_images(
        &self,
        namespace: &str,
        repository: &str,
    ) -> RegistryResult<Vec<Value>> {
        validate_repository(namespace, repository)?;
        let raw = match self
            .store
            .get(&keys::image_list(namespace, repository))
            .await
        {
            Ok(raw) => raw,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Vec<Value>>(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(namespace, repository, error = %e, "ignoring corrupt image list");
                Ok(Vec::new())
            }
        }
    }

    /// Append image records to a repository's list and return the full list.
    #[instrument(skip(self, body))]
    pub async fn append_images(
        &self,
        namespace: &str,
        repository: &str,
        body: &[u8],
    ) -> RegistryResult<Vec<Value>> {
        validate_repository(namespace, repository)?;
        let new_records = validate_image_records(body)?;

        let mut records = self.list_images(namespace, repository).await?;
        debug!(
            existing = records.len(),
            added = new_records.len(),
            "appending image records"
        );
        records.extend(new_records);

        self.store
            .put(
                &keys::image_list(namespace, repository),
                Bytes::from(serde_json::to_vec(&records)?),
            )
            .await?;
        Ok(records)
    }
}
