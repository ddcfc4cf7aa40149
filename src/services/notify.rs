// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification dispatch over push and email.
//!
//! Both channels are attempted independently; one failing never blocks the
//! other. The dedup marker on the user is written only after the email went
//! out, so a failed send is retried by the next pass.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::DynRepo;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::services::window::ChargeWindow;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one dispatch attempt for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Window was empty; nothing sent, marker untouched.
    NothingToSend,
    /// A send was attempted; per-channel results inside.
    Dispatched(DispatchReport),
}

/// Per-channel results of a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub push: ChannelStatus,
    pub email: ChannelStatus,
    /// Set iff the dedup marker was persisted.
    pub marked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Channel not configured for this user or deployment.
    Skipped,
    Sent,
    Failed(String),
}

impl ChannelStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, ChannelStatus::Sent)
    }
}

// ─── Push Transport ──────────────────────────────────────────────────────

/// FCM legacy HTTP push client.
pub struct PushClient {
    http: Option<reqwest::Client>,
    endpoint: String,
    /// Server key for the legacy API; `None` disables push delivery.
    server_key: Option<String>,
    #[cfg(test)]
    attempts: std::sync::atomic::AtomicU32,
    #[cfg(test)]
    mock_fail: std::sync::atomic::AtomicBool,
}

impl PushClient {
    pub fn new(endpoint: &str, server_key: Option<String>) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            endpoint: endpoint.to_string(),
            server_key,
            #[cfg(test)]
            attempts: std::sync::atomic::AtomicU32::new(0),
            #[cfg(test)]
            mock_fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Create a mock push client for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            http: None,
            endpoint: "http://localhost:0/fcm/send".to_string(),
            server_key: Some("mock-server-key".to_string()),
            #[cfg(test)]
            attempts: std::sync::atomic::AtomicU32::new(0),
            #[cfg(test)]
            mock_fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Whether this deployment can deliver push at all.
    pub fn enabled(&self) -> bool {
        self.server_key.is_some()
    }

    /// Make sends fail (test builds only).
    #[cfg(test)]
    pub fn set_mock_fail(&self, fail: bool) {
        self.mock_fail
            .store(fail, std::sync::atomic::Ordering::Relaxed);
    }

    /// Number of send attempts observed (test builds only).
    #[cfg(test)]
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Send a window summary to one device token.
    pub async fn send_charge_alert(&self, device_token: &str, window: &ChargeWindow) -> Result<()> {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            self.attempts.fetch_add(1, Ordering::Relaxed);
            if self.mock_fail.load(Ordering::Relaxed) {
                return Err(AppError::Transport("mock push failure".to_string()));
            }
        }

        // Mock mode (Debug builds only)
        #[cfg(debug_assertions)]
        {
            if self.http.is_none() {
                tracing::debug!("Mock push send (offline mode)");
                return Ok(());
            }
        }

        let http = self
            .http
            .as_ref()
            .ok_or_else(|| AppError::Transport("Push client not connected".to_string()))?;
        let server_key = self
            .server_key
            .as_ref()
            .ok_or_else(|| AppError::Transport("Push delivery is disabled".to_string()))?;

        let payload = serde_json::json!({
            "to": device_token,
            "notification": {
                "title": "Subtrack",
                "body": push_summary(window),
            },
            "data": {
                "type": "upcoming_charges",
            },
        });

        let response = http
            .post(&self.endpoint)
            .timeout(SEND_TIMEOUT)
            .header("Authorization", format!("key={}", server_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }
}

// ─── Mail Transport ──────────────────────────────────────────────────────

/// HTTP mail relay client.
pub struct MailClient {
    http: Option<reqwest::Client>,
    base_url: String,
    api_token: String,
    from: String,
    #[cfg(test)]
    attempts: std::sync::atomic::AtomicU32,
    #[cfg(test)]
    mock_fail: std::sync::atomic::AtomicBool,
}

impl MailClient {
    pub fn new(base_url: &str, api_token: &str, from: &str) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            from: from.to_string(),
            #[cfg(test)]
            attempts: std::sync::atomic::AtomicU32::new(0),
            #[cfg(test)]
            mock_fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Create a mock mail client for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            http: None,
            base_url: "http://localhost:0".to_string(),
            api_token: "mock-mail-token".to_string(),
            from: "Subtrack <noreply@subtrack.test>".to_string(),
            #[cfg(test)]
            attempts: std::sync::atomic::AtomicU32::new(0),
            #[cfg(test)]
            mock_fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make sends fail (test builds only).
    #[cfg(test)]
    pub fn set_mock_fail(&self, fail: bool) {
        self.mock_fail
            .store(fail, std::sync::atomic::Ordering::Relaxed);
    }

    /// Number of send attempts observed (test builds only).
    #[cfg(test)]
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Send a plain-text message through the relay.
    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            self.attempts.fetch_add(1, Ordering::Relaxed);
            if self.mock_fail.load(Ordering::Relaxed) {
                return Err(AppError::Transport("mock mail failure".to_string()));
            }
        }

        // Mock mode (Debug builds only)
        #[cfg(debug_assertions)]
        {
            if self.http.is_none() {
                tracing::debug!(to, "Mock mail send (offline mode)");
                return Ok(());
            }
        }

        let http = self
            .http
            .as_ref()
            .ok_or_else(|| AppError::Transport("Mail client not connected".to_string()))?;

        let payload = serde_json::json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": text,
        });

        let response = http
            .post(format!("{}/messages", self.base_url))
            .timeout(SEND_TIMEOUT)
            .header("X-Api-Token", &self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────

/// Sends an aggregated window over both channels and records the dedup
/// marker on success.
pub struct Notifier {
    repo: DynRepo,
    push: PushClient,
    mail: MailClient,
}

impl Notifier {
    pub fn new(repo: DynRepo, push: PushClient, mail: MailClient) -> Self {
        Self { repo, push, mail }
    }

    /// Dispatch one user's window.
    ///
    /// Push goes out only when the user has a device token and the
    /// deployment has a server key. Email always goes out. The dedup marker
    /// is written iff the email was delivered; a failed marker write is
    /// logged and left for the next pass to retry.
    pub async fn dispatch(
        &self,
        user: &User,
        window: &ChargeWindow,
        sent_at: DateTime<Utc>,
    ) -> DispatchOutcome {
        if window.items.is_empty() {
            tracing::debug!(user_id = %user.id, "Empty window, nothing to dispatch");
            return DispatchOutcome::NothingToSend;
        }

        let push = match (&user.push_token, self.push.enabled()) {
            (Some(token), true) => match self.push.send_charge_alert(token, window).await {
                Ok(()) => ChannelStatus::Sent,
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Push delivery failed");
                    ChannelStatus::Failed(e.to_string())
                }
            },
            _ => ChannelStatus::Skipped,
        };

        let subject = email_subject(window);
        let body = email_body(user, window);
        let email = match self.mail.send(&user.email, &subject, &body).await {
            Ok(()) => ChannelStatus::Sent,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Email delivery failed");
                ChannelStatus::Failed(e.to_string())
            }
        };

        let mut marked_at = None;
        if email.is_sent() {
            match self.repo.update_user_last_notified(&user.id, sent_at).await {
                Ok(()) => marked_at = Some(sent_at),
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.id,
                        error = %e,
                        "Failed to persist notification marker"
                    );
                }
            }
        }

        tracing::info!(
            user_id = %user.id,
            count = window.count,
            total_huf = window.total_huf,
            push = ?push,
            email = ?email,
            "Notification dispatched"
        );

        DispatchOutcome::Dispatched(DispatchReport {
            push,
            email,
            marked_at,
        })
    }
}

// ─── Message Formatting ──────────────────────────────────────────────────

fn email_subject(window: &ChargeWindow) -> String {
    format!("Upcoming charges ({})", window.count)
}

fn email_body(user: &User, window: &ChargeWindow) -> String {
    let name = user.username.as_deref().unwrap_or("there");
    let horizon = match window.notify_days_before {
        0 => "due today".to_string(),
        days => format!("due in the next {} day{}", days, plural_s(days)),
    };

    let mut body = format!(
        "Hi {},\n\nYou have {} upcoming charge{} {}:\n\n",
        name,
        window.count,
        plural_s(window.count),
        horizon,
    );
    for item in &window.items {
        body.push_str(&format!(
            "  * {} - {} {} - {}\n",
            item.name, item.price, item.currency, item.next_charge_date
        ));
    }
    body.push_str(&format!(
        "\nEstimated total: about {} HUF.\n\nSubtrack\n",
        format_huf(window.total_huf)
    ));
    body
}

fn push_summary(window: &ChargeWindow) -> String {
    format!(
        "{} upcoming charge{}, about {} HUF total",
        window.count,
        plural_s(window.count),
        format_huf(window.total_huf)
    )
}

fn plural_s(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Group thousands with spaces, Hungarian style: 390000 -> "390 000".
fn format_huf(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
