// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory [`Repository`] backend.
//!
//! Used by the integration tests and for offline development. Selection and
//! ordering semantics mirror the Firestore backend: range filters skip
//! documents with an unset date, and listings come back date-ordered with
//! unset dates first.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{SettingsPatch, Subscription, User};

#[derive(Default)]
pub struct MemoryRepo {
    users: DashMap<String, User>,
    subscriptions: DashMap<String, Subscription>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user directly, bypassing the trait.
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    fn due_for(&self, user_id: Option<&str>, as_of: NaiveDate) -> Vec<Subscription> {
        let mut due: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| {
                let sub = entry.value();
                user_id.is_none_or(|uid| sub.user_id == uid)
                    && sub.billing_cycle.is_some()
                    && sub.next_charge_date.is_some_and(|date| date <= as_of)
            })
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by(|a, b| a.id.cmp(&b.id));
        due
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    // ─── Users ───────────────────────────────────────────────────────────

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.get(user_id).map(|e| e.value().clone()))
    }

    async fn update_user_settings(&self, user_id: &str, patch: &SettingsPatch) -> Result<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::Database(format!("No such user: {}", user_id)))?;
        if let Some(currency) = &patch.default_currency {
            user.default_currency = Some(currency.clone());
        }
        if let Some(cycle) = &patch.default_billing_cycle {
            user.default_billing_cycle = Some(cycle.clone());
        }
        if let Some(days) = patch.notify_days_before {
            user.notify_days_before = Some(days);
        }
        Ok(())
    }

    async fn update_user_last_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::Database(format!("No such user: {}", user_id)))?;
        user.last_notification_sent_at = Some(at);
        Ok(())
    }

    async fn set_push_token(&self, user_id: &str, token: &str) -> Result<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::Database(format!("No such user: {}", user_id)))?;
        user.push_token = Some(token.to_string());
        Ok(())
    }

    // ─── Subscriptions ───────────────────────────────────────────────────

    async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let mut subs: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        subs.sort_by(|a, b| {
            a.next_charge_date
                .cmp(&b.next_charge_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(subs)
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.get(id).map(|e| e.value().clone()))
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn delete_subscription(&self, id: &str) -> Result<()> {
        self.subscriptions.remove(id);
        Ok(())
    }

    async fn list_due_subscriptions(&self, as_of: NaiveDate) -> Result<Vec<Subscription>> {
        Ok(self.due_for(None, as_of))
    }

    async fn list_due_subscriptions_for_user(
        &self,
        user_id: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<Subscription>> {
        Ok(self.due_for(Some(user_id), as_of))
    }

    async fn list_subscriptions_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>> {
        let mut subs: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| {
                let sub = entry.value();
                sub.user_id == user_id
                    && sub
                        .next_charge_date
                        .is_some_and(|date| date >= from && date <= to)
            })
            .map(|entry| entry.value().clone())
            .collect();
        subs.sort_by(|a, b| {
            a.next_charge_date
                .cmp(&b.next_charge_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(subs)
    }

    async fn update_subscription_next_charge(&self, id: &str, next: NaiveDate) -> Result<()> {
        let mut sub = self
            .subscriptions
            .get_mut(id)
            .ok_or_else(|| AppError::Database(format!("No such subscription: {}", id)))?;
        sub.next_charge_date = Some(next);
        Ok(())
    }
}
