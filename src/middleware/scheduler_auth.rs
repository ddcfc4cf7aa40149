// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler trigger authentication middleware.
//!
//! The `/tasks/*` routes are invoked by an external cron (Cloud Scheduler or
//! similar) carrying a shared secret. The comparison is constant-time so the
//! header can't be guessed byte by byte.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the shared scheduler secret.
pub const SCHEDULER_TOKEN_HEADER: &str = "x-scheduler-token";

/// Require the shared scheduler token for `/tasks/*` routes.
pub async fn require_scheduler_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(SCHEDULER_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());

    let Some(presented) = presented else {
        tracing::warn!("Blocked scheduler request without token header");
        return Err(StatusCode::FORBIDDEN);
    };

    let authorized: bool = presented
        .as_bytes()
        .ct_eq(state.config.scheduler_token.as_bytes())
        .into();

    if !authorized {
        tracing::warn!("Blocked scheduler request with invalid token");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
