//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_NOTIFY_DAYS_BEFORE;
use crate::models::subscription::{BillingCycle, Currency};

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (also used as document ID)
    pub id: String,
    /// Email address, the primary notification channel
    pub email: String,
    /// Display name
    #[serde(default)]
    pub username: Option<String>,
    /// Prefill default applied when a subscription is created without a currency
    #[serde(default)]
    pub default_currency: Option<Currency>,
    /// Prefill default applied when a subscription is created without a cycle
    #[serde(default)]
    pub default_billing_cycle: Option<BillingCycle>,
    /// Notification window lookahead in days; see [`User::notify_days`]
    #[serde(default)]
    pub notify_days_before: Option<i64>,
    /// Dedup marker: when the last notification email went out.
    /// Written only by the dispatcher, after a successful send.
    #[serde(default)]
    pub last_notification_sent_at: Option<DateTime<Utc>>,
    /// Device token for push delivery; absent means email only
    #[serde(default)]
    pub push_token: Option<String>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Effective notification lookahead in days.
    ///
    /// Absent or invalid (negative, oversized) stored values fall back to the
    /// default. Zero is valid and means "alert on the due day only".
    pub fn notify_days(&self) -> u32 {
        self.notify_days_before
            .and_then(|days| u32::try_from(days).ok())
            .unwrap_or(DEFAULT_NOTIFY_DAYS_BEFORE)
    }
}

/// Partial update for user preference fields. `None` leaves the stored value
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_billing_cycle: Option<BillingCycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_days_before: Option<i64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.default_currency.is_none()
            && self.default_billing_cycle.is_none()
            && self.notify_days_before.is_none()
    }

    /// Document field paths this patch writes.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.default_currency.is_some() {
            paths.push("default_currency");
        }
        if self.default_billing_cycle.is_some() {
            paths.push("default_billing_cycle");
        }
        if self.notify_days_before.is_some() {
            paths.push("notify_days_before");
        }
        paths
    }
}
