//! Image endpoints: layer, metadata and ancestry.

use super::{json_response, no_cache_headers};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use stowage_storage::{ByteStream, StorageError};

/// Header carrying the declared `algorithm:hex` checksum of an image.
pub const CHECKSUM_HEADER: &str = "x-docker-checksum";

/// GET /v1/images/{image_id}/layer
pub async fn get_image_layer(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> ApiResult<Response> {
    let stream = state.registry.get_layer(&image_id).await?;
    let body_stream = stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string())));

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(body_stream),
    )
        .into_response())
}

/// PUT /v1/images/{image_id}/layer
pub async fn put_image_layer(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    body: Body,
) -> ApiResult<Response> {
    let stream: ByteStream = Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(|e| StorageError::Io(std::io::Error::other(e)))),
    );

    if let Err(e) = state.registry.put_layer(&image_id, stream).await {
        metrics::record_upload_error(&e);
        return Err(e.into());
    }
    metrics::LAYERS_COMMITTED.inc();
    Ok(json_response(StatusCode::OK, true))
}

/// GET /v1/images/{image_id}/json
pub async fn get_image_json(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> ApiResult<Response> {
    let json = state.registry.get_image_json(&image_id).await?;

    let mut response = (
        StatusCode::OK,
        no_cache_headers(),
        [(CONTENT_TYPE, "application/json")],
        json.body,
    )
        .into_response();
    if let Some(checksum) = json.checksum
        && let Ok(value) = checksum.parse()
    {
        response.headers_mut().insert(CHECKSUM_HEADER, value);
    }
    Ok(response)
}

/// PUT /v1/images/{image_id}/json
pub async fn put_image_json(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> ApiResult<Response> {
    let checksum = headers
        .get(CHECKSUM_HEADER)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("{CHECKSUM_HEADER} is not valid text")))
        })
        .transpose()?;

    state
        .registry
        .put_image_json(&image_id, body, checksum)
        .await?;
    metrics::IMAGES_REGISTERED.inc();
    Ok(json_response(StatusCode::OK, true))
}

/// GET /v1/images/{image_id}/ancestry
pub async fn get_image_ancestry(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> ApiResult<Response> {
    let ancestry = state.registry.get_ancestry(&image_id).await?;
    Ok(json_response(StatusCode::OK, ancestry))
}
