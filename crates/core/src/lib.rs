//! Core domain types and shared logic for the stowage image store.
//!
//! This crate defines the canonical data model used across all other crates:
//! - The storage key layout (the on-disk / on-bucket schema)
//! - Algorithm-tagged checksums and the layer digest
//! - Image metadata, ancestry and repository image records
//! - Configuration types

pub mod checksum;
pub mod config;
pub mod error;
pub mod image;
pub mod keys;

pub use checksum::{Checksum, ChecksumAlgorithm, LayerHasher};
pub use error::{Error, Result};
pub use image::{Ancestry, ImageMetadata, validate_image_records};
