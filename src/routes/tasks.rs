// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Scheduled pass trigger routes.
//!
//! These endpoints are called by the deployment's cron (Cloud Scheduler or
//! similar), not directly by users. The shared-secret middleware is applied
//! in routes/mod.rs.

use crate::error::Result;
use crate::services::scheduler::{NotificationPassOutcome, PassMode, RolloverOutcome};
use crate::time_utils::resolve_as_of;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

/// Pass trigger routes (called by the scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/rollover", post(run_rollover))
        .route("/tasks/notify", post(run_notify))
}

/// Optional trigger body. An empty body runs today's full pass.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    /// Reference date override, `YYYY-MM-DD`
    pub as_of: Option<String>,
    /// Notification pass mode; defaults to `full`
    pub mode: Option<PassMode>,
}

/// Advance every due subscription across all users.
async fn run_rollover(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TriggerRequest>>,
) -> Result<Json<RolloverOutcome>> {
    let trigger = body.map(|Json(t)| t).unwrap_or_default();
    let as_of = resolve_as_of(trigger.as_of.as_deref())?;

    let outcome = state.scheduler.run_rollover_pass(as_of).await?;
    Ok(Json(outcome))
}

/// Aggregate and dispatch every user's charge window.
async fn run_notify(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TriggerRequest>>,
) -> Result<Json<NotificationPassOutcome>> {
    let trigger = body.map(|Json(t)| t).unwrap_or_default();
    let as_of = resolve_as_of(trigger.as_of.as_deref())?;
    let mode = trigger.mode.unwrap_or(PassMode::Full);

    let outcome = state.scheduler.run_notification_pass(as_of, mode).await?;
    Ok(Json(outcome))
}
