// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: the [`Repository`] trait and its backends.
//!
//! Production runs against Firestore; tests run against the in-memory
//! backend. Both implement the same trait so the scheduler and the HTTP
//! handlers never see a concrete store.

pub mod firestore;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{SettingsPatch, Subscription, User};

pub use firestore::FirestoreDb;
pub use memory::MemoryRepo;

/// Collection names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
}

/// Shared handle to whichever backend the process runs against.
pub type DynRepo = Arc<dyn Repository>;

/// Persistence operations the rest of the application is written against.
#[async_trait]
pub trait Repository: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────────────

    /// All users, for scheduler passes.
    async fn list_users(&self) -> Result<Vec<User>>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Apply a partial preferences update. Fields the patch leaves `None`
    /// keep their stored value.
    async fn update_user_settings(&self, user_id: &str, patch: &SettingsPatch) -> Result<()>;

    /// Record when the last notification went out. Written only after a
    /// successful email send.
    async fn update_user_last_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn set_push_token(&self, user_id: &str, token: &str) -> Result<()>;

    // ─── Subscriptions ───────────────────────────────────────────────────

    /// A user's subscriptions, ordered by next charge date (unset dates
    /// first).
    async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>>;

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>>;

    /// Create or fully replace a subscription document.
    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()>;

    async fn delete_subscription(&self, id: &str) -> Result<()>;

    /// Subscriptions across all users whose next charge date is on or before
    /// `as_of` and whose billing cycle is set. Input to the rollover pass.
    async fn list_due_subscriptions(&self, as_of: NaiveDate) -> Result<Vec<Subscription>>;

    /// Same selection as [`Repository::list_due_subscriptions`], restricted
    /// to one user.
    async fn list_due_subscriptions_for_user(
        &self,
        user_id: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<Subscription>>;

    /// A user's subscriptions with a next charge date in `[from, to]`,
    /// bounds inclusive. Input to window aggregation.
    async fn list_subscriptions_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>>;

    /// Move a subscription's next charge date, leaving all other fields
    /// untouched.
    async fn update_subscription_next_charge(&self, id: &str, next: NaiveDate) -> Result<()>;
}
