use axum::http::StatusCode;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use fop_core::athlete::Athlete;
use fop_core::config::Config;
use fop_core::group::Group;
use fop_core::registry::EngineRegistry;
use fop_core::roster::MemoryRoster;
use fop_core::types::Gender;
use fop_server::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn roster() -> Arc<MemoryRoster> {
    let mut a = Athlete::new(1, "Ana", "Lopez", Gender::F);
    a.start_number = Some(1);
    a.attempts[0].declaration = Some(70);
    let mut b = Athlete::new(2, "Bea", "Ng", Gender::F);
    b.start_number = Some(2);
    b.attempts[0].declaration = Some(75);
    Arc::new(MemoryRoster::new(vec![Group::new("W1", vec![a, b])]))
}

/// Router over engines for platforms A and B, mirror key `k`.
fn app() -> (axum::Router, Arc<EngineRegistry>) {
    let config = Config {
        platforms: vec!["A".into(), "B".into()],
        ..Config::default()
    };
    let registry = Arc::new(EngineRegistry::start(&config, roster()));
    let router = fop_server::build_router(AppState::new(registry.clone(), Some("k".into())));
    (router, registry)
}

async fn send(app: axum::Router, req: axum::http::Request<axum::body::Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    send(app, req).await
}

async fn post_json(app: axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, req).await
}

async fn post_form(app: axum::Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

async fn switch_to_w1(app: &axum::Router) {
    let (status, _) = post_json(
        app.clone(),
        "/api/platforms/A/events",
        serde_json::json!({ "origin": "announcer", "type": "switch_group", "group": "W1" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

// ---------------------------------------------------------------------------
// Platforms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lists_configured_platforms() {
    let (app, registry) = app();
    let (status, body) = get(app, "/api/platforms").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["A", "B"]));
    registry.shutdown().await;
}

#[tokio::test]
async fn unknown_platform_is_404() {
    let (app, registry) = app();
    let (status, body) = get(app, "/api/platforms/Z").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Z"));
    registry.shutdown().await;
}

#[tokio::test]
async fn switch_group_shows_first_athlete() {
    let (app, registry) = app();
    switch_to_w1(&app).await;

    let (status, body) = get(app.clone(), "/api/platforms/A").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "TIME_STOPPED");
    assert_eq!(body["group"], "W1");
    assert_eq!(body["current"]["last_name"], "Lopez");

    let (status, timer) = get(app, "/api/platforms/A/timer/athlete").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["remaining_ms"], 60000);
    assert_eq!(timer["running"], false);
    registry.shutdown().await;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rule_violation_is_422_and_changes_nothing() {
    let (app, registry) = app();
    switch_to_w1(&app).await;

    let (status, body) = post_json(
        app.clone(),
        "/api/platforms/A/events",
        serde_json::json!({
            "origin": "marshal",
            "type": "weight_change",
            "athlete": 1,
            "attempt": 3,
            "field": "change1",
            "weight": 90
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (_, state) = get(app, "/api/platforms/A").await;
    assert_eq!(state["current"]["last_name"], "Lopez");
    registry.shutdown().await;
}

#[tokio::test]
async fn oversized_weight_is_422_and_engine_keeps_running() {
    let (app, registry) = app();
    switch_to_w1(&app).await;

    let (status, _) = post_json(
        app.clone(),
        "/api/platforms/A/events",
        serde_json::json!({
            "origin": "marshal",
            "type": "weight_change",
            "athlete": 1,
            "attempt": 1,
            "field": "change1",
            "weight": u32::MAX
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, state) = get(app, "/api/platforms/A").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["current"]["last_name"], "Lopez");
    registry.shutdown().await;
}

#[tokio::test]
async fn unknown_group_is_404() {
    let (app, registry) = app();
    let (status, _) = post_json(
        app,
        "/api/platforms/B/events",
        serde_json::json!({ "origin": "announcer", "type": "switch_group", "group": "M7" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    registry.shutdown().await;
}

#[tokio::test]
async fn malformed_event_is_rejected() {
    let (app, registry) = app();
    let (status, _) = post_json(
        app,
        "/api/platforms/A/events",
        serde_json::json!({ "origin": "announcer", "type": "no_such_event" }),
    )
    .await;
    assert!(status.is_client_error());
    registry.shutdown().await;
}

#[tokio::test]
async fn event_stream_is_sse() {
    let (app, registry) = app();
    let req = axum::http::Request::builder()
        .uri("/api/platforms/A/events?origin=scoreboard-1")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(ct.starts_with("text/event-stream"));
    registry.shutdown().await;
}

#[tokio::test]
async fn stopped_engine_is_503() {
    let (app, registry) = app();
    registry.shutdown().await;
    let (status, _) = get(app, "/api/platforms/A").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mirror_requires_update_key() {
    let (app, registry) = app();
    let (status, _) = post_form(app.clone(), "/mirror/update", "fop=A&fullName=X").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = post_form(app, "/mirror/update", "updateKey=nope&fop=A").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    registry.shutdown().await;
}

#[tokio::test]
async fn mirror_serves_latest_update() {
    let (app, registry) = app();
    let (status, _) = get(app.clone(), "/mirror/A").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_form(
        app.clone(),
        "/mirror/update",
        "updateKey=k&fop=A&fullName=LOPEZ+Ana&weight=70",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_form(
        app.clone(),
        "/mirror/timer",
        "updateKey=k&fopName=A&eventType=StartTime&milliseconds=60000",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(app, "/mirror/A").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["update"]["fullName"], "LOPEZ Ana");
    assert_eq!(body["timer"]["milliseconds"], "60000");
    assert!(body["update"].get("updateKey").is_none());
    registry.shutdown().await;
}

#[tokio::test]
async fn mirror_post_paths_reject_get() {
    let (app, registry) = app();
    let req = axum::http::Request::builder()
        .uri("/mirror/decision")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    registry.shutdown().await;
}
