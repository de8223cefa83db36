// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use event_roster::config::Config;
use event_roster::db::{FirestoreDb, InMemoryDb};
use event_roster::routes::create_router;
use event_roster::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app backed by a fresh in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::new(Config::test_default(), Arc::new(InMemoryDb::new()))
            .expect("test config should be valid"),
    );
    (create_router(state.clone()), state)
}

/// Create a test app whose database is disconnected; every store call fails.
#[allow(dead_code)]
pub fn create_offline_app() -> axum::Router {
    let state = Arc::new(
        AppState::new(Config::test_default(), Arc::new(FirestoreDb::new_mock()))
            .expect("test config should be valid"),
    );
    create_router(state)
}

/// Send a request and return the status plus the JSON body (`Null` if empty).
#[allow(dead_code)]
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Create a user through the API and return its id.
#[allow(dead_code)]
pub async fn create_user(app: &axum::Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/users",
        Some(serde_json::json!({
            "username": username,
            "email": format!("{}@x.com", username),
            "password": password,
            "birthday": "1990-01-01",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create user failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

/// Create an event through the API and return its id.
#[allow(dead_code)]
pub async fn create_event(app: &axum::Router, name: &str, participants: &[&str]) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/events",
        Some(serde_json::json!({
            "name": name,
            "schedule": "2024-05-01",
            "participantes": participants,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create event failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

/// Collect a JSON array of strings.
#[allow(dead_code)]
pub fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
