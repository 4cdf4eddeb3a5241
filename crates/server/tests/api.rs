//! HTTP-level tests for the server routes, driven through the router with
//! `tower::ServiceExt::oneshot` so no socket is bound.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use imgmatch::{EmbeddingRecord, EmbeddingStore, ImgmatchConfig, StaticStore};
use serde_json::{json, Value};
use server::{build_router, spawn_refresh, ServerConfig, ServerState};
use tower::ServiceExt;

fn reference_state() -> Arc<ServerState> {
    Arc::new(
        ServerState::with_store(
            ServerConfig::default(),
            ImgmatchConfig::default(),
            StaticStore::reference(),
        )
        .expect("reference state"),
    )
}

fn inline_pipeline() -> ImgmatchConfig {
    ImgmatchConfig::from_yaml_str(
        r#"
version: "1.0"
store:
  source: "inline"
  records:
    - id: "north"
      embedding: [0.0, 1.0]
    - "$id": "east"
      vector: "[1.0, 0.0]"
    - id: "broken"
      embedding: "not a vector"
"#,
    )
    .expect("inline pipeline")
}

fn similar_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/similar-images")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn query(state: Arc<ServerState>, body: Value) -> (StatusCode, Value) {
    send(build_router(state), similar_request(body.to_string())).await
}

#[tokio::test]
async fn test_reference_scenario() {
    let (status, body) = query(reference_state(), json!({ "embedding": [0.1, 0.2, 0.3] })).await;
    assert_eq!(status, StatusCode::OK);

    let hits = body["similar_images"].as_array().unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0]["id"], "image1");
    assert!((hits[0]["similarity"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(hits[1]["id"], "image2");
    assert_eq!(hits[2]["id"], "image3");

    let scores: Vec<f64> = hits.iter().map(|h| h["similarity"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_top_k_follows_pipeline_config() {
    let pipeline = ImgmatchConfig::from_yaml_str("version: \"1.0\"\nranker:\n  top_k: 1\n").unwrap();
    let state = Arc::new(
        ServerState::with_store(ServerConfig::default(), pipeline, StaticStore::reference()).unwrap(),
    );

    let (status, body) = query(state, json!({ "embedding": [0.7, 0.8, 0.9] })).await;
    assert_eq!(status, StatusCode::OK);
    let hits = body["similar_images"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], "image3");
}

#[tokio::test]
async fn test_malformed_queries_are_rejected() {
    let cases = [
        json!({}),
        json!({ "embedding": null }),
        json!({ "embedding": "0.1,0.2,0.3" }),
        json!({ "embedding": [0.1, "x", 0.3] }),
        json!({ "embedding": [] }),
    ];

    for case in cases {
        let (status, body) = query(reference_state(), case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case {case}");
        assert_eq!(body["error"]["code"], "MALFORMED_QUERY", "case {case}");
    }
}

#[tokio::test]
async fn test_invalid_json_and_content_type_are_malformed() {
    let (status, body) = send(build_router(reference_state()), similar_request("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_QUERY");

    let request = Request::builder()
        .method("POST")
        .uri("/api/similar-images")
        .body(Body::from(json!({ "embedding": [0.1, 0.2, 0.3] }).to_string()))
        .unwrap();
    let (status, body) = send(build_router(reference_state()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_QUERY");
}

#[tokio::test]
async fn test_dimension_mismatch_is_unprocessable() {
    let (status, body) = query(reference_state(), json!({ "embedding": [0.1, 0.2] })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "DIMENSION_MISMATCH");
    assert!(body["error"]["message"].as_str().unwrap().contains('3'));
}

#[tokio::test]
async fn test_empty_store_returns_no_candidates() {
    let state = Arc::new(
        ServerState::with_store(
            ServerConfig::default(),
            ImgmatchConfig::default(),
            StaticStore::empty(),
        )
        .unwrap(),
    );

    // Any dimension is accepted when there is nothing to compare against
    let (status, body) = query(state, json!({ "embedding": [1.0, 2.0, 3.0, 4.0] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "similar_images": [] }));
}

#[tokio::test]
async fn test_payload_too_large() {
    let config = ServerConfig {
        max_body_size_mb: 0,
        ..Default::default()
    };
    let state = Arc::new(
        ServerState::with_store(config, ImgmatchConfig::default(), StaticStore::reference()).unwrap(),
    );

    let (status, body) = query(state, json!({ "embedding": [0.1, 0.2, 0.3] })).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let request = Request::builder().uri("/api/nope").body(Body::empty()).unwrap();
    let (status, body) = send(build_router(reference_state()), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = build_router(reference_state());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"]["records"], 3);
    assert_eq!(body["store"]["dimension"], 3);
    assert_eq!(body["store"]["source"], "reference");

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]
        .as_array()
        .unwrap()
        .contains(&json!("/api/similar-images")));
}

#[tokio::test]
async fn test_metrics_without_recorder_reports_json() {
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, body) = send(build_router(reference_state()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"], 3);
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let app = build_router(reference_state());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let generated = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(!generated.is_empty());

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "trace-me-42");
}

#[tokio::test]
async fn test_reload_publishes_new_snapshot() {
    let seeded = StaticStore::new(vec![EmbeddingRecord::new("stale", vec![1.0, 1.0])]).unwrap();
    let state = Arc::new(ServerState::with_store(ServerConfig::default(), inline_pipeline(), seeded).unwrap());
    let app = build_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/store/reload")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "inline");
    assert_eq!(body["accepted"], 2);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["previous_records"], 1);
    assert_eq!(body["dimension"], 2);

    let request = Request::builder().uri("/api/v1/store/stats").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"], 2);
    assert_eq!(body["reloads"], 1);
    assert_eq!(body["last_skipped"], 1);

    let (status, body) = send(app, similar_request(json!({ "embedding": [2.0, 0.0] }).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["similar_images"][0]["id"], "east");
    assert_eq!(body["similar_images"][1]["id"], "north");
    assert_eq!(body["similar_images"][1]["similarity"], 0.0);
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    let pipeline = ImgmatchConfig::from_yaml_str(
        "version: \"1.0\"\nstore:\n  source: \"file\"\n  path: \"/nonexistent/imgmatch/reference.json\"\n",
    )
    .unwrap();
    let state = Arc::new(
        ServerState::with_store(ServerConfig::default(), pipeline, StaticStore::reference()).unwrap(),
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/store/reload")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(build_router(state.clone()), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STORE_ERROR");
    assert_eq!(state.store.len(), 3);
}

#[tokio::test]
async fn test_background_refresh_swaps_store() {
    let state = Arc::new(
        ServerState::with_store(ServerConfig::default(), inline_pipeline(), StaticStore::empty()).unwrap(),
    );
    let task = spawn_refresh(state.clone(), Duration::from_millis(20));

    let mut refreshed = false;
    for _ in 0..100 {
        if state.store.len() == 2 {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();

    assert!(refreshed, "refresh task never published the inline records");
    assert_eq!(state.store.dimension(), Some(2));
}
