//! Repository endpoints: tags and image lists.

use super::json_response;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;

/// GET /v1/repositories/{namespace}/{repository}/tags
pub async fn list_tags(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
) -> ApiResult<Response> {
    let tags = state.registry.list_tags(&namespace, &repository).await?;
    Ok(json_response(StatusCode::OK, tags))
}

/// GET /v1/repositories/{namespace}/{repository}/tags/{tag}
pub async fn get_tag(
    State(state): State<AppState>,
    Path((namespace, repository, tag)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let image_id = state
        .registry
        .get_tag(&namespace, &repository, &tag)
        .await?;
    Ok(json_response(StatusCode::OK, image_id))
}

/// PUT /v1/repositories/{namespace}/{repository}/tags/{tag}
///
/// The body is the image id as a JSON string.
pub async fn put_tag(
    State(state): State<AppState>,
    Path((namespace, repository, tag)): Path<(String, String, String)>,
    body: bytes::Bytes,
) -> ApiResult<Response> {
    let image_id: String = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("tag body must be a JSON string: {e}")))?;

    state
        .registry
        .set_tag(&namespace, &repository, &tag, &image_id)
        .await?;
    Ok(json_response(StatusCode::OK, true))
}

/// DELETE /v1/repositories/{namespace}/{repository}/tags/{tag}
pub async fn delete_tag(
    State(state): State<AppState>,
    Path((namespace, repository, tag)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    state
        .registry
        .delete_tag(&namespace, &repository, &tag)
        .await?;
    Ok(json_response(StatusCode::OK, true))
}

/// DELETE /v1/repositories/{namespace}/{repository}/
pub async fn delete_repository(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
) -> ApiResult<Response> {
    state
        .registry
        .delete_repository(&namespace, &repository)
        .await?;
    Ok(json_response(StatusCode::OK, true))
}

/// GET /v1/repositories/{namespace}/{repository}/images
pub async fn get_repository_images(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
) -> ApiResult<Response> {
    let images = state.registry.list_images(&namespace, &repository).await?;
    Ok(json_response(StatusCode::OK, images))
}

/// PUT /v1/repositories/{namespace}/{repository}/images
pub async fn put_repository_images(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
    body: bytes::Bytes,
) -> ApiResult<Response> {
    let images = state
        .registry
        .append_images(&namespace, &repository, &body)
        .await?;
    Ok(json_response(StatusCode::OK, images))
}
