//! Application state shared across handlers.

use std::sync::Arc;
use stowage_core::config::AppConfig;
use stowage_registry::Registry;
use stowage_storage::ObjectStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Protocol operations over the configured backend.
    pub registry: Registry,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Registry::new(storage),
        }
    }
}
