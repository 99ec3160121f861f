//! Prometheus metrics for the stowage server.
//!
//! The `/metrics` endpoint is unauthenticated. Restrict it at the network
//! level when the server is reachable from untrusted hosts.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};
use stowage_registry::RegistryError;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static IMAGES_REGISTERED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stowage_images_registered_total",
        "Total number of image metadata registrations",
    )
    .expect("metric creation failed")
});

pub static LAYERS_COMMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stowage_layers_committed_total",
        "Total number of layers that passed checksum verification",
    )
    .expect("metric creation failed")
});

pub static CHECKSUM_MISMATCHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stowage_checksum_mismatches_total",
        "Total number of layer uploads rejected for a checksum mismatch",
    )
    .expect("metric creation failed")
});

pub static BUFFER_SLOT_CONFLICTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stowage_buffer_slot_conflicts_total",
        "Total number of uploads refused because the same key was already buffering",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(IMAGES_REGISTERED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(LAYERS_COMMITTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CHECKSUM_MISMATCHES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BUFFER_SLOT_CONFLICTS.clone()))
            .expect("metric registration failed");
    });
}

/// Count a failed upload by cause.
pub fn record_upload_error(err: &RegistryError) {
    if matches!(err, RegistryError::ChecksumMismatch { .. }) {
        CHECKSUM_MISMATCHES.inc();
    } else if err.is_upload_in_progress() {
        BUFFER_SLOT_CONFLICTS.inc();
    }
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}
