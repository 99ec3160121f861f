//! Image registry operations on top of an [`ObjectStore`].
//!
//! An image moves through three states, defined purely by which records are
//! stored:
//! - **Absent**: no metadata.
//! - **Registered**: metadata and the in-progress mark are present.
//! - **Committed**: metadata present, mark absent, layer verified.
//!
//! Registration writes the checksum, mark, metadata and ancestry. A layer
//! upload overwrites the layer, recomputes the digest over
//! `metadata ++ "\n" ++ layer` and clears the mark on a match.
//!
//! [`ObjectStore`]: stowage_storage::ObjectStore

pub mod error;
pub mod images;
pub mod repositories;

pub use error::{ErrorKind, RegistryError, RegistryResult};
pub use images::{ImageJson, ImageState};

use std::sync::Arc;
use stowage_storage::ObjectStore;

/// Registry operations bound to one storage backend.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn ObjectStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}
