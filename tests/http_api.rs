use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use party_sync::{
    config::AppConfig,
    dao::session_store::MemoryStore,
    routes,
    services::{round_service::try_open_round, session_service::snapshot},
    state::{AppState, SharedState},
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_app() -> (Router, SharedState) {
    let state = AppState::new(Arc::new(MemoryStore::new()), AppConfig::default());
    (routes::router(Arc::clone(&state)), state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create(app: &Router, variant: &str, capacity: u32) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/sessions",
        Some(json!({ "variant": variant, "capacity": capacity })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn session_creation_rejects_bad_capacities() {
    let (app, _) = test_app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({ "variant": "charades", "capacity": 21 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = call(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({ "variant": "mafia", "capacity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_lookup_maps_codes_to_statuses() {
    let (app, _) = test_app();
    let code = create(&app, "impostor", 4).await;

    let (status, body) = call(&app, Method::GET, &format!("/sessions/{code}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"], 4);
    assert_eq!(body["phase"], "setup");

    let lowercase = code.to_ascii_lowercase();
    let (status, _) = call(&app, Method::GET, &format!("/sessions/{lowercase}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let unknown = if code == "AAAAAA" { "BBBBBB" } else { "AAAAAA" };
    let (status, _) = call(&app, Method::GET, &format!("/sessions/{unknown}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::GET, "/sessions/nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn seat_claims_fill_the_table_then_conflict() {
    let (app, _) = test_app();
    let code = create(&app, "charades", 3).await;
    let seats = format!("/sessions/{code}/seats");

    let (status, body) = call(&app, Method::POST, &seats, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seat"], 0);

    // The host's seat is not handed to a player who asks for it.
    let (_, body) = call(&app, Method::POST, &seats, Some(json!({ "seat": 2 }))).await;
    assert_eq!(body["seat"], 1);

    let (status, body) = call(&app, Method::POST, &format!("/sessions/{code}/host"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seat"], 2);

    let (status, _) = call(&app, Method::POST, &seats, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::POST, &seats, Some(json!({ "seat": 25 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn observing_and_viewing_check_the_seat() {
    let (app, _) = test_app();
    let code = create(&app, "mafia", 4).await;

    let observe = format!("/sessions/{code}/seats/0/observe");
    let (status, _) = call(&app, Method::POST, &observe, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&app, Method::POST, &format!("/sessions/{code}/seats"), Some(json!({}))).await;
    let (status, body) = call(&app, Method::POST, &observe, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["observed_round"], 1);

    let (status, body) = call(&app, Method::GET, &format!("/sessions/{code}/seats/0/view"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["round"], 1);

    let (status, _) = call(&app, Method::GET, &format!("/sessions/{code}/seats/9/view"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn actions_follow_the_round_lifecycle() {
    let (app, state) = test_app();
    let code = create(&app, "charades", 2).await;
    let actions = format!("/sessions/{code}/actions");

    let (status, _) = call(&app, Method::POST, &actions, Some(json!({ "action": "guessed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&app, Method::POST, &format!("/sessions/{code}/seats"), Some(json!({}))).await;
    call(&app, Method::POST, &format!("/sessions/{code}/host"), None).await;
    let (session, seats) = snapshot(&state, &code.parse().unwrap()).await.unwrap();
    let opened = try_open_round(&state, &session, &seats).await.unwrap().unwrap();
    let seq = opened.turn_seq;

    let (status, body) = call(
        &app,
        Method::POST,
        &actions,
        Some(json!({ "action": "not_guessed", "expected_seq": seq })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], true);
    assert_eq!(body["turn_seq"], seq + 1);

    let (status, body) = call(
        &app,
        Method::POST,
        &actions,
        Some(json!({ "action": "not_guessed", "expected_seq": seq })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], false);
    assert!(body.get("turn").is_none());

    let (status, _) = call(&app, Method::POST, &actions, Some(json!({ "action": "spin" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::POST, &format!("/sessions/{code}/rounds"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["round"], 2);
    assert_eq!(body["phase"], "round_complete");
}

#[tokio::test]
async fn event_stream_registers_the_device() {
    let (app, state) = test_app();
    let code = create(&app, "who_am_i", 3).await;

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{code}/events?p=1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(state.devices().len(), 1);

    let unknown = if code == "AAAAAA" { "BBBBBB" } else { "AAAAAA" };
    let (status, _) = call(&app, Method::GET, &format!("/sessions/{unknown}/events"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
