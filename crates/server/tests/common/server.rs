//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::sync::Arc;
use stowage_core::checksum::layer_checksum;
use stowage_core::config::AppConfig;
use stowage_server::{AppState, create_router};
use stowage_storage::{FilesystemBackend, ObjectStore};
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper backed by a temporary local store.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig::for_testing(&storage_path);
        modifier(&mut config);

        stowage_server::metrics::register_metrics();
        let state = AppState::new(config, storage);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and collect the status and body.
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: impl Into<Body>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = self.send(builder.body(body.into()).unwrap()).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    /// Register an image over HTTP with the checksum of `layer`.
    pub async fn register(&self, id: &str, parent: Option<&str>, layer: &[u8]) -> StatusCode {
        let metadata = image_json(id, parent);
        let checksum = layer_checksum(metadata.as_bytes(), layer).to_string();
        let (status, _) = self
            .call(
                "PUT",
                &format!("/v1/images/{id}/json"),
                &[("X-Docker-Checksum", &checksum)],
                metadata,
            )
            .await;
        status
    }

    /// Upload a layer over HTTP.
    pub async fn upload(&self, id: &str, layer: &'static [u8]) -> StatusCode {
        let (status, _) = self
            .call("PUT", &format!("/v1/images/{id}/layer"), &[], layer)
            .await;
        status
    }
}

/// Image metadata document with an optional parent.
#[allow(dead_code)]
pub fn image_json(id: &str, parent: Option<&str>) -> String {
    match parent {
        Some(parent) => format!(r#"{{"id":"{id}","parent":"{parent}"}}"#),
        None => format!(r#"{{"id":"{id}"}}"#),
    }
}
