//! Triage trigger endpoint integration tests
//!
//! No gateway is configured in tests, so every pass exercises the fail-open
//! path: neutral score, empty concerns, `scored = false`.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use halo_dispatch::db::{CallRepo, DbPool, InsightRepo};
use halo_dispatch::triage::DEFAULT_URGENCY;

mod common;
use common::{build_state, setup_test_db};

fn build_app(db: DbPool) -> Router {
    halo_dispatch::api::router(build_state(db))
}

async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_urgency_score_without_gateway_is_unscored_default() {
    let db = setup_test_db();
    let calls = CallRepo::new(db.clone());
    let session = calls.resolve_or_create("call_1").unwrap();

    let app = build_app(db.clone());
    let (status, json) = post_json(
        &app,
        "/api/ai/urgency-score",
        r#"{"call_id":"call_1","transcript":"He's bleeding badly. I'm locked in the bathroom."}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["call_id"], "call_1");
    assert_eq!(json["score"], i64::from(DEFAULT_URGENCY));
    assert_eq!(json["scored"], false);

    // The unscored marker is persisted with the insight
    let insight = InsightRepo::new(db).latest(&session.id).unwrap().unwrap();
    assert_eq!(insight.urgency_score, DEFAULT_URGENCY);
    assert!(!insight.scored);

    let session = calls.get("call_1").unwrap().unwrap();
    assert_eq!(session.urgency_score, Some(DEFAULT_URGENCY));
}

#[tokio::test]
async fn test_key_concerns_without_gateway_is_empty() {
    let db = setup_test_db();
    CallRepo::new(db.clone()).resolve_or_create("call_2").unwrap();

    let app = build_app(db);
    let (status, json) = post_json(
        &app,
        "/api/ai/key-concerns",
        r#"{"call_id":"call_2","transcript":"Please hurry."}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["call_id"], "call_2");
    assert_eq!(json["concerns"], serde_json::json!([]));
}

#[tokio::test]
async fn test_triage_for_unknown_call_returns_but_does_not_persist() {
    let db = setup_test_db();
    let app = build_app(db.clone());

    let (status, json) = post_json(
        &app,
        "/api/ai/urgency-score",
        r#"{"call_id":"never_seen","transcript":"hello"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["score"], i64::from(DEFAULT_URGENCY));
    assert!(CallRepo::new(db).get("never_seen").unwrap().is_none());
}

#[tokio::test]
async fn test_health_endpoint() {
    let db = setup_test_db();
    let app = build_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_reports_triage_unavailable() {
    let db = setup_test_db();
    let app = build_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Triage is fail-open; a missing gateway does not degrade readiness
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["triage"]["status"], "unavailable");
}
