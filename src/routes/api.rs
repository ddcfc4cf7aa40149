// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{BillingCycle, Currency, SettingsPatch, Subscription, User};
use crate::services::billing;
use crate::services::notify::DispatchOutcome;
use crate::services::scheduler::RolloverOutcome;
use crate::services::window::ChargeWindow;
use crate::time_utils::{format_utc_rfc3339, resolve_as_of};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route(
            "/api/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/api/subscriptions/rollover", post(rollover_subscriptions))
        .route(
            "/api/subscriptions/{id}",
            get(get_subscription)
                .put(update_subscription)
                .delete(delete_subscription),
        )
        .route("/api/subscriptions/{id}/bump", post(bump_subscription))
        .route("/api/notifications/preview", get(preview_notifications))
        .route("/api/notifications/send-now", post(send_notifications_now))
        .route("/api/push/register", post(register_push_token))
}

/// Optional reference-date override, `YYYY-MM-DD`. Defaults to today (UTC).
#[derive(Deserialize)]
struct AsOfQuery {
    as_of: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuccessResponse {
    pub success: bool,
}

// ─── Helpers ─────────────────────────────────────────────────

async fn load_user(state: &AppState, user_id: &str) -> Result<User> {
    state
        .repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

/// Fetch a subscription and verify ownership. A subscription owned by
/// someone else is indistinguishable from a missing one.
async fn load_owned_subscription(
    state: &AppState,
    user_id: &str,
    subscription_id: &str,
) -> Result<Subscription> {
    state
        .repo
        .get_subscription(subscription_id)
        .await?
        .filter(|s| s.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Subscription {} not found", subscription_id)))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub default_currency: Option<Currency>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub default_billing_cycle: Option<BillingCycle>,
    /// Effective value; the stored field may be unset
    pub notify_days_before: u32,
    pub last_notification_sent_at: Option<String>,
    pub push_registered: bool,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = load_user(&state, &user.user_id).await?;
    let notify_days_before = profile.notify_days();

    Ok(Json(UserResponse {
        id: profile.id,
        email: profile.email,
        username: profile.username,
        default_currency: profile.default_currency,
        default_billing_cycle: profile.default_billing_cycle,
        notify_days_before,
        last_notification_sent_at: profile.last_notification_sent_at.map(format_utc_rfc3339),
        push_registered: profile.push_token.is_some(),
    }))
}

// ─── Settings ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SettingsResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub default_currency: Option<Currency>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub default_billing_cycle: Option<BillingCycle>,
    /// Effective value; the stored field may be unset
    pub notify_days_before: u32,
}

fn settings_response(user: &User) -> SettingsResponse {
    SettingsResponse {
        default_currency: user.default_currency.clone(),
        default_billing_cycle: user.default_billing_cycle.clone(),
        notify_days_before: user.notify_days(),
    }
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SettingsResponse>> {
    let profile = load_user(&state, &user.user_id).await?;
    Ok(Json(settings_response(&profile)))
}

/// Partial settings update. Absent fields keep their stored value.
#[derive(Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    /// Currency code; unrecognized codes are kept verbatim
    pub default_currency: Option<String>,
    pub default_billing_cycle: Option<String>,
    /// 0 is valid: alert on the due day only
    #[validate(range(min = 0, max = 365))]
    pub notify_days_before: Option<i64>,
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let patch = SettingsPatch {
        default_currency: payload.default_currency.as_deref().map(Currency::from_code),
        default_billing_cycle: payload
            .default_billing_cycle
            .as_deref()
            .map(BillingCycle::from_code),
        notify_days_before: payload.notify_days_before,
    };
    if patch.is_empty() {
        return Err(AppError::BadRequest(
            "No settings fields provided".to_string(),
        ));
    }

    state.repo.update_user_settings(&user.user_id, &patch).await?;

    let updated = load_user(&state, &user.user_id).await?;
    Ok(Json(settings_response(&updated)))
}

// ─── Subscriptions ───────────────────────────────────────────

/// Body for subscription create and update.
///
/// On create, a missing currency or cycle falls back to the user's profile
/// defaults (then HUF for currency). On update, absent optional fields keep
/// the stored value.
#[derive(Deserialize, Validate)]
pub struct SubscriptionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    pub currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub next_charge_date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Subscription>>> {
    Ok(Json(state.repo.list_subscriptions(&user.user_id).await?))
}

async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Subscription>> {
    let sub = load_owned_subscription(&state, &user.user_id, &id).await?;
    Ok(Json(sub))
}

async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<Subscription>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let profile = load_user(&state, &user.user_id).await?;
    let currency = payload
        .currency
        .as_deref()
        .map(Currency::from_code)
        .or(profile.default_currency)
        .unwrap_or(Currency::Huf);
    let billing_cycle = payload
        .billing_cycle
        .as_deref()
        .map(BillingCycle::from_code)
        .or(profile.default_billing_cycle);

    let subscription = Subscription {
        id: Uuid::new_v4().to_string(),
        user_id: user.user_id.clone(),
        name: payload.name,
        price: payload.price,
        currency,
        billing_cycle,
        next_charge_date: payload.next_charge_date,
        category: payload.category,
        notes: payload.notes,
        created_at: Utc::now(),
    };

    state.repo.upsert_subscription(&subscription).await?;
    tracing::info!(
        user_id = %user.user_id,
        subscription_id = %subscription.id,
        "Subscription created"
    );

    Ok(Json(subscription))
}

async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<Subscription>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut sub = load_owned_subscription(&state, &user.user_id, &id).await?;
    sub.name = payload.name;
    sub.price = payload.price;
    if let Some(code) = payload.currency.as_deref() {
        sub.currency = Currency::from_code(code);
    }
    if let Some(code) = payload.billing_cycle.as_deref() {
        sub.billing_cycle = Some(BillingCycle::from_code(code));
    }
    if let Some(date) = payload.next_charge_date {
        sub.next_charge_date = Some(date);
    }
    if let Some(category) = payload.category {
        sub.category = Some(category);
    }
    if let Some(notes) = payload.notes {
        sub.notes = Some(notes);
    }

    state.repo.upsert_subscription(&sub).await?;
    Ok(Json(sub))
}

async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let sub = load_owned_subscription(&state, &user.user_id, &id).await?;
    state.repo.delete_subscription(&sub.id).await?;

    tracing::info!(
        user_id = %user.user_id,
        subscription_id = %sub.id,
        "Subscription deleted"
    );
    Ok(Json(SuccessResponse { success: true }))
}

/// Manually push the next charge date one cycle forward.
async fn bump_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Subscription>> {
    let mut sub = load_owned_subscription(&state, &user.user_id, &id).await?;

    let cycle = sub
        .billing_cycle
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Subscription has no billing cycle".to_string()))?;
    let current = sub
        .next_charge_date
        .ok_or_else(|| AppError::BadRequest("Subscription has no next charge date".to_string()))?;
    let next = billing::cycle_step(cycle, current).ok_or_else(|| {
        AppError::BadRequest(format!("Billing cycle '{}' cannot be advanced", cycle))
    })?;

    state
        .repo
        .update_subscription_next_charge(&sub.id, next)
        .await?;
    sub.next_charge_date = Some(next);

    Ok(Json(sub))
}

/// Advance all of the caller's overdue subscriptions, as the nightly pass
/// would.
async fn rollover_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<RolloverOutcome>> {
    let as_of = resolve_as_of(query.as_of.as_deref())?;
    let outcome = state
        .scheduler
        .run_rollover_for_user(&user.user_id, as_of)
        .await?;
    Ok(Json(outcome))
}

// ─── Notifications ───────────────────────────────────────────

/// Aggregate the caller's window without sending anything or touching the
/// dedup marker.
async fn preview_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<ChargeWindow>> {
    let as_of = resolve_as_of(query.as_of.as_deref())?;
    let window = state.scheduler.preview_window(&user.user_id, as_of).await?;
    Ok(Json(window))
}

/// Dispatch the caller's current window immediately.
async fn send_notifications_now(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DispatchOutcome>> {
    let outcome = state.scheduler.send_now(&user.user_id).await?;
    Ok(Json(outcome))
}

// ─── Push Registration ───────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RegisterPushRequest {
    #[validate(length(min = 1, max = 4096))]
    pub token: String,
}

async fn register_push_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RegisterPushRequest>,
) -> Result<Json<SuccessResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .repo
        .set_push_token(&user.user_id, &payload.token)
        .await?;

    tracing::info!(user_id = %user.user_id, "Push token registered");
    Ok(Json(SuccessResponse { success: true }))
}
