//! Liveness and index stub endpoints.

use super::json_response;
use axum::http::StatusCode;
use axum::response::Response;

/// GET /_ping
pub async fn ping() -> Response {
    json_response(StatusCode::OK, true)
}

/// GET /
pub async fn root() -> Response {
    json_response(StatusCode::OK, "stowage registry server")
}

/// GET|POST /v1/users
///
/// Login stub for clients that check credentials before pushing.
pub async fn users() -> Response {
    json_response(StatusCode::OK, true)
}
