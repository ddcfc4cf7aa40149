// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`Repository`] implementation.
//!
//! Dates are stored as ISO `YYYY-MM-DD` strings, so range filters compare
//! lexicographically and agree with calendar order. Documents with an unset
//! (null) date never match a range filter.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{collections, Repository};
use crate::error::{AppError, Result};
use crate::models::{SettingsPatch, Subscription, User};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Create or fully replace a user document.
    ///
    /// User profiles are provisioned out of band (sign-up flow, fixtures);
    /// the request path only ever patches individual fields.
    pub async fn upsert_user(&self, user: &User) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Field-masked write: only `paths` are touched on the document.
    async fn patch_document<T: Serialize + for<'de> Deserialize<'de> + Sync + Send>(
        &self,
        collection: &str,
        document_id: &str,
        paths: Vec<&str>,
        value: &T,
    ) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths)
            .in_col(collection)
            .document_id(document_id)
            .object(value)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct NextChargePatch {
    next_charge_date: NaiveDate,
}

#[derive(Serialize, Deserialize)]
struct LastNotifiedPatch {
    last_notification_sent_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct PushTokenPatch {
    push_token: String,
}

#[async_trait]
impl Repository for FirestoreDb {
    // ─── Users ───────────────────────────────────────────────────────────

    async fn list_users(&self) -> Result<Vec<User>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_user_settings(&self, user_id: &str, patch: &SettingsPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.patch_document(collections::USERS, user_id, patch.field_paths(), patch)
            .await
    }

    async fn update_user_last_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.patch_document(
            collections::USERS,
            user_id,
            vec!["last_notification_sent_at"],
            &LastNotifiedPatch {
                last_notification_sent_at: at,
            },
        )
        .await
    }

    async fn set_push_token(&self, user_id: &str, token: &str) -> Result<()> {
        self.patch_document(
            collections::USERS,
            user_id,
            vec!["push_token"],
            &PushTokenPatch {
                push_token: token.to_string(),
            },
        )
        .await
    }

    // ─── Subscriptions ───────────────────────────────────────────────────

    async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([(
                "next_charge_date",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SUBSCRIPTIONS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&subscription.id)
            .object(subscription)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_subscription(&self, id: &str) -> Result<()> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::SUBSCRIPTIONS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_due_subscriptions(&self, as_of: NaiveDate) -> Result<Vec<Subscription>> {
        let as_of = as_of.to_string();
        let due: Vec<Subscription> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(move |q| q.field("next_charge_date").less_than_or_equal(as_of.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Unset billing cycles cannot be advanced; filtered here because the
        // date filter alone cannot express "cycle is set" without a composite
        // index.
        Ok(due
            .into_iter()
            .filter(|s| s.billing_cycle.is_some())
            .collect())
    }

    async fn list_due_subscriptions_for_user(
        &self,
        user_id: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<Subscription>> {
        let user_id = user_id.to_string();
        let as_of = as_of.to_string();
        let due: Vec<Subscription> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("next_charge_date").less_than_or_equal(as_of.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(due
            .into_iter()
            .filter(|s| s.billing_cycle.is_some())
            .collect())
    }

    async fn list_subscriptions_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>> {
        let user_id = user_id.to_string();
        let from = from.to_string();
        let to = to.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("next_charge_date").greater_than_or_equal(from.clone()),
                    q.field("next_charge_date").less_than_or_equal(to.clone()),
                ])
            })
            .order_by([(
                "next_charge_date",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_subscription_next_charge(&self, id: &str, next: NaiveDate) -> Result<()> {
        self.patch_document(
            collections::SUBSCRIPTIONS,
            id,
            vec!["next_charge_date"],
            &NextChargePatch {
                next_charge_date: next,
            },
        )
        .await
    }
}
