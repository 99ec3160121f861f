//! Local staging files for uploads of unknown length.
//!
//! Each storage key maps to exactly one slot file named by the SHA-256 of the
//! key. Reserving a slot that is already taken fails immediately. A single
//! mutex guards the reservation table; the file I/O happens outside it.

use crate::error::{StorageError, StorageResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs;
use tracing::{debug, warn};

type SlotTable = Arc<Mutex<HashSet<String>>>;

/// Directory of buffer slots plus the reservation table.
#[derive(Debug)]
pub struct BufferDir {
    root: PathBuf,
    reserved: SlotTable,
}

impl BufferDir {
    /// Create the directory if needed and clear slot files left by a previous
    /// process. Files not named like slots are left alone.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_slot = entry.file_name().to_str().is_some_and(Self::is_slot_name);
            if is_slot && entry.file_type().await?.is_file() {
                debug!(path = %entry.path().display(), "removing stale buffer slot");
                fs::remove_file(entry.path()).await?;
            }
        }

        Ok(Self {
            root,
            reserved: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Slot name for a key.
    pub fn slot_name(key: &str) -> String {
        stowage_core::checksum::to_hex(&Sha256::digest(key.as_bytes()))
    }

    /// Whether a file name has the shape [`slot_name`](Self::slot_name) produces.
    fn is_slot_name(name: &str) -> bool {
        name.len() == 64 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Reserve the slot for `key`.
    ///
    /// Fails with [`StorageError::UploadInProgress`] if another upload to the
    /// same key holds it.
    pub fn reserve(&self, key: &str) -> StorageResult<BufferSlot> {
        let name = Self::slot_name(key);
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        if !reserved.insert(name.clone()) {
            warn!(key = %key, "buffer slot already reserved");
            return Err(StorageError::UploadInProgress(key.to_string()));
        }

        Ok(BufferSlot {
            path: self.root.join(&name),
            name,
            reserved: Arc::clone(&self.reserved),
        })
    }

    /// Number of slots currently reserved.
    pub fn reserved_count(&self) -> usize {
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A reserved slot. Dropping it deletes the file and frees the slot.
#[derive(Debug)]
pub struct BufferSlot {
    path: PathBuf,
    name: String,
    reserved: SlotTable,
}

impl BufferSlot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BufferSlot {
    fn drop(&mut self) {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove buffer slot");
        }
        reserved.remove(&self.name);
    }
}
