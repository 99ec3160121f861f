//! HTTP server for the stowage image store.
//!
//! This crate is the thin wire layer over [`stowage_registry`]:
//! - Image layer, metadata and ancestry endpoints
//! - Tag, repository and image-list endpoints
//! - Liveness endpoints and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
