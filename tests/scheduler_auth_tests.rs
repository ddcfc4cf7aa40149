// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security tests for the scheduler trigger routes.
//!
//! `/tasks/*` must only react to the shared-secret header. A valid user
//! session is not enough to start a pass.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_rollover_no_header_forbidden() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/rollover")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rollover_wrong_token_forbidden() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/rollover")
                .header("x-scheduler-token", "not-the-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rollover_with_token_allowed() {
    let (app, state, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/rollover")
                .header("x-scheduler-token", state.config.scheduler_token.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // Empty repo: a clean no-op pass.
    let body = common::response_json(response).await;
    assert_eq!(body["updated"], 0);
    assert_eq!(body["skipped"], 0);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn test_session_jwt_does_not_trigger_passes() {
    let (app, _, repo) = common::create_test_app();
    repo.insert_user(common::test_user("u1"));
    let token = common::create_test_jwt("u1");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/notify")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_notify_with_token_allowed() {
    let (app, state, _) = common::create_test_app();

    let payload = json!({ "as_of": "2024-01-01" });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/notify")
                .header("content-type", "application/json")
                .header("x-scheduler-token", state.config.scheduler_token.clone())
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = common::response_json(response).await;
    assert_eq!(body["rate_source"], "fallback");
    assert!(body["outcomes"].as_array().unwrap().is_empty());
}
