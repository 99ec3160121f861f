//! Integration tests for HTTP API endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestServer, image_json};
use serde_json::{Value, json};

fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_ping_and_root() {
    let server = TestServer::new().await;

    let response = server
        .send(Request::get("/_ping").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["pragma"], "no-cache");
    assert_eq!(headers["expires"], "-1");

    let (status, body) = server.call("GET", "/", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse(&body).is_string());
}

#[tokio::test]
async fn test_users_stub() {
    let server = TestServer::new().await;
    for method in ["GET", "POST"] {
        let (status, body) = server.call(method, "/v1/users", &[], Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&body), json!(true));
    }
}

#[tokio::test]
async fn test_push_and_pull_image() {
    let server = TestServer::new().await;

    assert_eq!(server.register("A1", None, b"layer-a1").await, StatusCode::OK);
    assert_eq!(server.upload("A1", b"layer-a1").await, StatusCode::OK);

    let (status, body) = server
        .call("GET", "/v1/images/A1/layer", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"layer-a1");

    let (status, body) = server
        .call("GET", "/v1/images/A1/ancestry", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body), json!(["A1"]));
}

#[tokio::test]
async fn test_image_json_returns_checksum_header() {
    let server = TestServer::new().await;
    server.register("A1", None, b"layer-a1").await;

    let response = server
        .send(Request::get("/v1/images/A1/json").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let checksum = response.headers()["x-docker-checksum"].to_str().unwrap();
    assert!(checksum.starts_with("sha256:"));
    assert_eq!(response.headers()["content-type"], "application/json");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body, image_json("A1", None).as_bytes());
}

#[tokio::test]
async fn test_child_ancestry() {
    let server = TestServer::new().await;
    server.register("A1", None, b"base").await;
    server.upload("A1", b"base").await;
    assert_eq!(server.register("B2", Some("A1"), b"top").await, StatusCode::OK);

    let (_, body) = server
        .call("GET", "/v1/images/B2/ancestry", &[], Body::empty())
        .await;
    assert_eq!(parse(&body), json!(["B2", "A1"]));
}

#[tokio::test]
async fn test_registration_errors() {
    let server = TestServer::new().await;

    // No checksum header.
    let (status, body) = server
        .call("PUT", "/v1/images/A1/json", &[], image_json("A1", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["code"], "bad_request");

    let (status, _) = server
        .call(
            "PUT",
            "/v1/images/A1/json",
            &[("X-Docker-Checksum", "md5:abcd")],
            image_json("A1", None),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(
        server.register("B2", Some("missing"), b"top").await,
        StatusCode::BAD_REQUEST
    );
    let (status, _) = server
        .call("GET", "/v1/images/B2/json", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_committed_image_conflicts() {
    let server = TestServer::new().await;
    server.register("A1", None, b"layer-a1").await;
    server.upload("A1", b"layer-a1").await;

    assert_eq!(server.register("A1", None, b"layer-a1").await, StatusCode::CONFLICT);
    let (status, body) = server
        .call("PUT", "/v1/images/A1/layer", &[], "other")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse(&body)["code"], "conflict");
}

#[tokio::test]
async fn test_checksum_mismatch_keeps_image_registered() {
    let server = TestServer::new().await;
    server.register("A1", None, b"expected").await;

    let (status, body) = server
        .call("PUT", "/v1/images/A1/layer", &[], "something else")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["code"], "checksum_mismatch");

    // A retry with the right bytes still commits.
    assert_eq!(server.upload("A1", b"expected").await, StatusCode::OK);
    assert_eq!(server.register("A1", None, b"expected").await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_layer_upload_requires_registration() {
    let server = TestServer::new().await;
    let (status, body) = server
        .call("PUT", "/v1/images/A1/layer", &[], "layer")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse(&body)["code"], "not_found");

    let (status, _) = server
        .call("GET", "/v1/images/A1/layer", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tags() {
    let server = TestServer::new().await;
    server.register("A1", None, b"layer-a1").await;
    server.upload("A1", b"layer-a1").await;

    let (status, _) = server
        .call("GET", "/v1/repositories/lib/app/tags", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .call("PUT", "/v1/repositories/lib/app/tags/latest", &[], r#""A1""#)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .call("GET", "/v1/repositories/lib/app/tags/latest", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body), json!("A1"));

    let (_, body) = server
        .call("GET", "/v1/repositories/lib/app/tags", &[], Body::empty())
        .await;
    assert_eq!(parse(&body), json!({"latest": "A1"}));

    let (status, _) = server
        .call("DELETE", "/v1/repositories/lib/app/tags/latest", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server
        .call("GET", "/v1/repositories/lib/app/tags/latest", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tag_errors() {
    let server = TestServer::new().await;

    let (status, _) = server
        .call("PUT", "/v1/repositories/lib/app/tags/latest", &[], r#""nope""#)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .call("PUT", "/v1/repositories/lib/app/tags/latest", &[], "not json")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .call("DELETE", "/v1/repositories/lib/app/tags/latest", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_repository_images_and_delete() {
    let server = TestServer::new().await;

    let (status, body) = server
        .call("GET", "/v1/repositories/lib/app/images", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body), json!([]));

    let (status, body) = server
        .call(
            "PUT",
            "/v1/repositories/lib/app/images",
            &[],
            r#"[{"id":"A1"},{"id":"B2","Tag":"latest"}]"#,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body).as_array().unwrap().len(), 2);

    let (status, _) = server
        .call("PUT", "/v1/repositories/lib/app/images", &[], r#"{"id":"A1"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .call("DELETE", "/v1/repositories/lib/app/", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server
        .call("GET", "/v1/repositories/lib/app/images", &[], Body::empty())
        .await;
    assert_eq!(parse(&body), json!([]));

    let (status, _) = server
        .call("DELETE", "/v1/repositories/lib/app/", &[], Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let server = TestServer::new().await;
    let response = server
        .send(
            Request::get("/v1/images/missing/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["cache-control"], "no-cache");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;
    server.register("A1", None, b"layer-a1").await;
    server.upload("A1", b"layer-a1").await;

    let (status, body) = server.call("GET", "/metrics", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("stowage_layers_committed_total"));
    assert!(text.contains("stowage_images_registered_total"));
}

#[tokio::test]
async fn test_metrics_endpoint_disabled() {
    let server = TestServer::with_config(|config| config.server.metrics_enabled = false).await;
    let (status, _) = server.call("GET", "/metrics", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
