// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for the rollover pass.
//!
//! The pass advances every due next-charge date past the reference date in
//! one run, preserving the anchor day and skipping what it cannot advance.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use std::sync::Arc;
use subtrack::db::{DynRepo, Repository};
use subtrack::models::BillingCycle;
use tower::ServiceExt;

mod common;
use common::{date, test_subscription, test_user};

/// POST /tasks/rollover with the scheduler secret and an as_of override.
fn rollover_request(scheduler_token: &str, as_of: &str) -> Request<Body> {
    let payload = json!({ "as_of": as_of });
    Request::builder()
        .method("POST")
        .uri("/tasks/rollover")
        .header("content-type", "application/json")
        .header("x-scheduler-token", scheduler_token)
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_rollover_advances_past_reference() {
    let (app, state, repo) = common::create_test_app();
    repo.insert_user(test_user("u1"));
    repo.upsert_subscription(&test_subscription("netflix", "u1", Some(date("2023-11-15"))))
        .await
        .unwrap();

    let response = app
        .oneshot(rollover_request(&state.config.scheduler_token, "2024-01-01"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::response_json(response).await;
    assert_eq!(body["updated"], 1);
    assert_eq!(body["skipped"], 0);
    assert_eq!(body["failed"], 0);

    // Two months behind: one pass catches up past the reference date and
    // keeps the anchor day.
    let sub = repo.get_subscription("netflix").await.unwrap().unwrap();
    assert_eq!(sub.next_charge_date, Some(date("2024-01-15")));
}

#[tokio::test]
async fn test_rollover_is_idempotent() {
    let (app, state, repo) = common::create_test_app();
    repo.insert_user(test_user("u1"));
    repo.upsert_subscription(&test_subscription("netflix", "u1", Some(date("2023-12-20"))))
        .await
        .unwrap();

    let first = app
        .clone()
        .oneshot(rollover_request(&state.config.scheduler_token, "2024-01-01"))
        .await
        .unwrap();
    assert_eq!(common::response_json(first).await["updated"], 1);

    let second = app
        .oneshot(rollover_request(&state.config.scheduler_token, "2024-01-01"))
        .await
        .unwrap();
    let body = common::response_json(second).await;
    assert_eq!(body["updated"], 0);
    assert_eq!(body["skipped"], 0);

    let sub = repo.get_subscription("netflix").await.unwrap().unwrap();
    assert_eq!(sub.next_charge_date, Some(date("2024-01-20")));
}

#[tokio::test]
async fn test_rollover_skips_unrecognized_cycle() {
    let (app, state, repo) = common::create_test_app();
    repo.insert_user(test_user("u1"));
    let mut sub = test_subscription("gym", "u1", Some(date("2023-12-25")));
    sub.billing_cycle = Some(BillingCycle::Other("weekly".to_string()));
    repo.upsert_subscription(&sub).await.unwrap();

    let response = app
        .oneshot(rollover_request(&state.config.scheduler_token, "2024-01-01"))
        .await
        .unwrap();

    let body = common::response_json(response).await;
    assert_eq!(body["updated"], 0);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["failed"], 0);

    // The date stays put until someone fixes the cycle.
    let stored = repo.get_subscription("gym").await.unwrap().unwrap();
    assert_eq!(stored.next_charge_date, Some(date("2023-12-25")));
}

#[tokio::test]
async fn test_rollover_leaves_future_dates_alone() {
    let (app, state, repo) = common::create_test_app();
    repo.insert_user(test_user("u1"));
    repo.upsert_subscription(&test_subscription("spotify", "u1", Some(date("2024-03-01"))))
        .await
        .unwrap();

    let response = app
        .oneshot(rollover_request(&state.config.scheduler_token, "2024-01-01"))
        .await
        .unwrap();

    let body = common::response_json(response).await;
    assert_eq!(body["updated"], 0);

    let sub = repo.get_subscription("spotify").await.unwrap().unwrap();
    assert_eq!(sub.next_charge_date, Some(date("2024-03-01")));
}

#[tokio::test]
async fn test_rollover_yearly_cycle() {
    let (app, state, repo) = common::create_test_app();
    repo.insert_user(test_user("u1"));
    let mut sub = test_subscription("domain", "u1", Some(date("2023-06-10")));
    sub.billing_cycle = Some(BillingCycle::Yearly);
    repo.upsert_subscription(&sub).await.unwrap();

    let response = app
        .oneshot(rollover_request(&state.config.scheduler_token, "2024-01-01"))
        .await
        .unwrap();

    assert_eq!(common::response_json(response).await["updated"], 1);
    let stored = repo.get_subscription("domain").await.unwrap().unwrap();
    assert_eq!(stored.next_charge_date, Some(date("2024-06-10")));
}

#[tokio::test]
async fn test_rollover_saturates_short_months() {
    let (app, state, repo) = common::create_test_app();
    repo.insert_user(test_user("u1"));
    repo.upsert_subscription(&test_subscription("rent", "u1", Some(date("2024-01-31"))))
        .await
        .unwrap();

    let response = app
        .oneshot(rollover_request(&state.config.scheduler_token, "2024-02-15"))
        .await
        .unwrap();

    assert_eq!(common::response_json(response).await["updated"], 1);

    // Jan 31 + 1 month lands on the last day of February (leap year).
    let stored = repo.get_subscription("rent").await.unwrap().unwrap();
    assert_eq!(stored.next_charge_date, Some(date("2024-02-29")));
}

#[tokio::test]
async fn test_rollover_rejects_invalid_as_of() {
    let (app, state, _) = common::create_test_app();

    let response = app
        .oneshot(rollover_request(&state.config.scheduler_token, "festivus"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_rollover_scoped_to_caller() {
    let (app, _, repo) = common::create_test_app();
    repo.insert_user(test_user("u1"));
    repo.insert_user(test_user("u2"));
    repo.upsert_subscription(&test_subscription("mine", "u1", Some(date("2023-12-01"))))
        .await
        .unwrap();
    repo.upsert_subscription(&test_subscription("theirs", "u2", Some(date("2023-12-01"))))
        .await
        .unwrap();

    let token = common::create_test_jwt("u1");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/subscriptions/rollover?as_of=2024-01-01")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::response_json(response).await["updated"], 1);

    // 2023-12-01 steps to 2024-01-01, which is still on the reference day,
    // so it steps once more.
    let mine = repo.get_subscription("mine").await.unwrap().unwrap();
    assert_eq!(mine.next_charge_date, Some(date("2024-02-01")));
    let theirs = repo.get_subscription("theirs").await.unwrap().unwrap();
    assert_eq!(theirs.next_charge_date, Some(date("2023-12-01")));
}

#[tokio::test]
async fn test_persistence_failure_isolates_other_subscriptions() {
    let memory = Arc::new(subtrack::db::MemoryRepo::new());
    memory.insert_user(test_user("u1"));
    for (id, next) in [("good-1", "2023-12-01"), ("bad", "2023-12-05"), ("good-2", "2023-12-10")] {
        memory
            .upsert_subscription(&test_subscription(id, "u1", Some(date(next))))
            .await
            .unwrap();
    }

    let mut flaky = common::FlakyRepo::new(memory.clone());
    flaky.fail_next_charge_ids = vec!["bad".to_string()];
    let repo: DynRepo = Arc::new(flaky);
    let scheduler = common::test_scheduler(repo);

    let outcome = scheduler.run_rollover_pass(date("2024-01-01")).await.unwrap();

    assert_eq!(outcome.updated, 2);
    assert_eq!(outcome.failed, 1);
    assert!(!outcome.is_clean());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].subscription_id, "bad");

    // The healthy subscriptions were persisted despite the failure.
    let good = memory.get_subscription("good-1").await.unwrap().unwrap();
    assert_eq!(good.next_charge_date, Some(date("2024-02-01")));
    let bad = memory.get_subscription("bad").await.unwrap().unwrap();
    assert_eq!(bad.next_charge_date, Some(date("2023-12-05")));
}
