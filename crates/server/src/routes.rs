//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let image_routes = Router::new()
        .route(
            "/v1/images/{image_id}/layer",
            get(handlers::get_image_layer).put(handlers::put_image_layer),
        )
        .route(
            "/v1/images/{image_id}/json",
            get(handlers::get_image_json).put(handlers::put_image_json),
        )
        .route(
            "/v1/images/{image_id}/ancestry",
            get(handlers::get_image_ancestry),
        );

    let repository_routes = Router::new()
        .route(
            "/v1/repositories/{namespace}/{repository}/tags",
            get(handlers::list_tags),
        )
        .route(
            "/v1/repositories/{namespace}/{repository}/tags/{tag}",
            get(handlers::get_tag)
                .put(handlers::put_tag)
                .delete(handlers::delete_tag),
        )
        .route(
            "/v1/repositories/{namespace}/{repository}/",
            delete(handlers::delete_repository),
        )
        .route(
            "/v1/repositories/{namespace}/{repository}/images",
            get(handlers::get_repository_images).put(handlers::put_repository_images),
        );

    let misc_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/_ping", get(handlers::ping))
        .route("/v1/_ping", get(handlers::ping))
        .route("/v1/users", get(handlers::users).post(handlers::users))
        .route("/v1/users/", get(handlers::users).post(handlers::users));

    let mut router = Router::new()
        .merge(image_routes)
        .merge(repository_routes)
        .merge(misc_routes);

    // Network-restrict this endpoint when enabled; see crate::metrics.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
