// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use subtrack::config::Config;
use subtrack::db::{DynRepo, FirestoreDb, MemoryRepo, Repository};
use subtrack::error::{AppError, Result};
use subtrack::middleware::auth::create_jwt;
use subtrack::models::{BillingCycle, Currency, SettingsPatch, Subscription, User};
use subtrack::routes::create_router;
use subtrack::services::{MailClient, Notifier, PushClient, RatesClient, Scheduler};
use subtrack::AppState;

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

/// Create a test app backed by the in-memory repository and offline mock
/// clients. Returns the router, the shared state, and the repo handle so
/// tests can seed users directly and inspect stored documents.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryRepo>) {
    let config = Config::default();
    let memory = Arc::new(MemoryRepo::new());
    let repo: DynRepo = memory.clone();

    let rates = RatesClient::new_mock();
    let notifier = Notifier::new(repo.clone(), PushClient::new_mock(), MailClient::new_mock());
    let scheduler = Scheduler::new(repo.clone(), rates.clone(), notifier);

    let state = Arc::new(AppState {
        config,
        repo,
        rates,
        scheduler,
    });

    (create_router(state.clone()), state, memory)
}

/// Create a session JWT signed with the test config's key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str) -> String {
    let config = Config::default();
    create_jwt(user_id, &config.jwt_signing_key).expect("Failed to create JWT")
}

/// Parse a `YYYY-MM-DD` date literal.
#[allow(dead_code)]
pub fn date(s: &str) -> NaiveDate {
    s.parse().expect("Invalid test date literal")
}

/// Basic user fixture with no preferences set.
#[allow(dead_code)]
pub fn test_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{}@example.test", id),
        username: Some("Test User".to_string()),
        default_currency: None,
        default_billing_cycle: None,
        notify_days_before: None,
        last_notification_sent_at: None,
        push_token: None,
        created_at: Utc::now(),
    }
}

/// Monthly 1000 HUF subscription fixture.
#[allow(dead_code)]
pub fn test_subscription(id: &str, user_id: &str, next: Option<NaiveDate>) -> Subscription {
    Subscription {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: format!("Subscription {}", id),
        price: 1000.0,
        currency: Currency::Huf,
        billing_cycle: Some(BillingCycle::Monthly),
        next_charge_date: next,
        category: None,
        notes: None,
        created_at: Utc::now(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&body).expect("Response body is not JSON")
}

/// Scheduler wired to the given repo with offline mock clients, for tests
/// that drive passes directly instead of through the router.
#[allow(dead_code)]
pub fn test_scheduler(repo: DynRepo) -> Scheduler {
    let notifier = Notifier::new(repo.clone(), PushClient::new_mock(), MailClient::new_mock());
    Scheduler::new(repo, RatesClient::new_mock(), notifier)
}

/// Repository wrapper that fails chosen operations, for failure-isolation
/// tests. Everything else delegates to the wrapped in-memory repo.
#[allow(dead_code)]
pub struct FlakyRepo {
    pub inner: Arc<MemoryRepo>,
    /// Subscription IDs whose next-charge updates fail.
    pub fail_next_charge_ids: Vec<String>,
    /// User IDs whose window listings fail.
    pub fail_range_user_ids: Vec<String>,
    /// Fail the all-users listing itself.
    pub fail_list_users: bool,
}

#[allow(dead_code)]
impl FlakyRepo {
    pub fn new(inner: Arc<MemoryRepo>) -> Self {
        Self {
            inner,
            fail_next_charge_ids: Vec::new(),
            fail_range_user_ids: Vec::new(),
            fail_list_users: false,
        }
    }
}

#[async_trait]
impl Repository for FlakyRepo {
    async fn list_users(&self) -> Result<Vec<User>> {
        if self.fail_list_users {
            return Err(AppError::Database("injected list_users failure".to_string()));
        }
        self.inner.list_users().await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.inner.get_user(user_id).await
    }

    async fn update_user_settings(&self, user_id: &str, patch: &SettingsPatch) -> Result<()> {
        self.inner.update_user_settings(user_id, patch).await
    }

    async fn update_user_last_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.inner.update_user_last_notified(user_id, at).await
    }

    async fn set_push_token(&self, user_id: &str, token: &str) -> Result<()> {
        self.inner.set_push_token(user_id, token).await
    }

    async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        self.inner.list_subscriptions(user_id).await
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        self.inner.get_subscription(id).await
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.inner.upsert_subscription(subscription).await
    }

    async fn delete_subscription(&self, id: &str) -> Result<()> {
        self.inner.delete_subscription(id).await
    }

    async fn list_due_subscriptions(&self, as_of: NaiveDate) -> Result<Vec<Subscription>> {
        self.inner.list_due_subscriptions(as_of).await
    }

    async fn list_due_subscriptions_for_user(
        &self,
        user_id: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<Subscription>> {
        self.inner.list_due_subscriptions_for_user(user_id, as_of).await
    }

    async fn list_subscriptions_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>> {
        if self.fail_range_user_ids.iter().any(|id| id == user_id) {
            return Err(AppError::Database(format!(
                "injected range failure for {}",
                user_id
            )));
        }
        self.inner.list_subscriptions_in_range(user_id, from, to).await
    }

    async fn update_subscription_next_charge(&self, id: &str, next: NaiveDate) -> Result<()> {
        if self.fail_next_charge_ids.iter().any(|f| f == id) {
            return Err(AppError::Database(format!(
                "injected write failure for {}",
                id
            )));
        }
        self.inner.update_subscription_next_charge(id, next).await
    }
}
