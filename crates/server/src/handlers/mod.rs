//! HTTP request handlers.

pub mod images;
pub mod misc;
pub mod repositories;

pub use images::*;
pub use misc::*;
pub use repositories::*;

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, EXPIRES, HeaderName, PRAGMA};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Headers that keep clients and proxies from caching registry answers.
pub fn no_cache_headers() -> [(HeaderName, &'static str); 3] {
    [
        (CACHE_CONTROL, "no-cache"),
        (PRAGMA, "no-cache"),
        (EXPIRES, "-1"),
    ]
}

/// A JSON response carrying the no-cache headers.
pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: T) -> Response {
    (status, no_cache_headers(), Json(value)).into_response()
}
