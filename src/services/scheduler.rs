// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduling passes over the whole user base.
//!
//! Two passes exist: rollover (advance stale next-charge dates) and
//! notification (aggregate each user's window and dispatch it). Both isolate
//! per-item failures; a pass only errors when its initial listing query
//! fails.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::db::DynRepo;
use crate::error::{AppError, Result};
use crate::models::{Subscription, User};
use crate::services::billing;
use crate::services::notify::{DispatchOutcome, DispatchReport, Notifier};
use crate::services::rates::{RateSnapshot, RateSource, RatesClient};
use crate::services::window::{self, ChargeWindow};

const MAX_CONCURRENT_USERS: usize = 8;
const MAX_CONCURRENT_ROLLOVERS: usize = 16;

/// Whether a notification pass dispatches or stops after aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    Full,
    PreviewOnly,
}

/// Summary of one rollover pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RolloverOutcome {
    /// Subscriptions whose next charge date moved forward.
    pub updated: u32,
    /// Due subscriptions that could not be advanced (unrecognized cycle).
    pub skipped: u32,
    /// Subscriptions whose new date failed to persist.
    pub failed: u32,
    pub failures: Vec<RolloverFailure>,
}

impl RolloverOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RolloverFailure {
    pub subscription_id: String,
    pub reason: String,
}

/// Per-user result of a notification pass.
#[derive(Debug, Clone, Serialize)]
pub struct UserPassOutcome {
    pub user_id: String,
    pub result: UserPassResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserPassResult {
    /// A dispatch was attempted; channel details inside.
    Notified(DispatchReport),
    /// Window was empty, nothing sent.
    NothingDue,
    /// Preview mode: aggregation only.
    Previewed { count: u32, total_huf: i64 },
    /// This user's pass failed; others were unaffected.
    Failed(String),
}

/// Summary of one notification pass.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPassOutcome {
    pub rate_source: RateSource,
    pub outcomes: Vec<UserPassOutcome>,
}

impl NotificationPassOutcome {
    pub fn processed(&self) -> u32 {
        self.outcomes.len() as u32
    }

    pub fn notified(&self) -> u32 {
        self.count_matching(|r| matches!(r, UserPassResult::Notified(_)))
    }

    pub fn nothing_due(&self) -> u32 {
        self.count_matching(|r| matches!(r, UserPassResult::NothingDue))
    }

    pub fn previewed(&self) -> u32 {
        self.count_matching(|r| matches!(r, UserPassResult::Previewed { .. }))
    }

    pub fn failed(&self) -> u32 {
        self.count_matching(|r| matches!(r, UserPassResult::Failed(_)))
    }

    fn count_matching(&self, pred: impl Fn(&UserPassResult) -> bool) -> u32 {
        self.outcomes.iter().filter(|o| pred(&o.result)).count() as u32
    }
}

/// Runs scheduling passes against the repository.
pub struct Scheduler {
    repo: DynRepo,
    rates: RatesClient,
    notifier: Notifier,
}

impl Scheduler {
    pub fn new(repo: DynRepo, rates: RatesClient, notifier: Notifier) -> Self {
        Self {
            repo,
            rates,
            notifier,
        }
    }

    // ─── Rollover Pass ───────────────────────────────────────────────────

    /// Advance every due subscription's next charge date past `as_of`.
    ///
    /// Errors only if the due listing itself fails; individual persistence
    /// failures are collected in the outcome.
    pub async fn run_rollover_pass(&self, as_of: NaiveDate) -> Result<RolloverOutcome> {
        let due = self.repo.list_due_subscriptions(as_of).await?;
        let outcome = self.rollover_subscriptions(due, as_of).await;

        tracing::info!(
            as_of = %as_of,
            updated = outcome.updated,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Rollover pass complete"
        );

        Ok(outcome)
    }

    /// Rollover restricted to one user's subscriptions.
    pub async fn run_rollover_for_user(
        &self,
        user_id: &str,
        as_of: NaiveDate,
    ) -> Result<RolloverOutcome> {
        let due = self
            .repo
            .list_due_subscriptions_for_user(user_id, as_of)
            .await?;
        let outcome = self.rollover_subscriptions(due, as_of).await;

        tracing::info!(
            user_id,
            as_of = %as_of,
            updated = outcome.updated,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "User rollover complete"
        );

        Ok(outcome)
    }

    async fn rollover_subscriptions(
        &self,
        due: Vec<Subscription>,
        as_of: NaiveDate,
    ) -> RolloverOutcome {
        let updated = Arc::new(AtomicU32::new(0));
        let skipped = Arc::new(AtomicU32::new(0));
        let failures = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        stream::iter(due)
            .for_each_concurrent(MAX_CONCURRENT_ROLLOVERS, |sub| {
                let updated = Arc::clone(&updated);
                let skipped = Arc::clone(&skipped);
                let failures = Arc::clone(&failures);
                async move {
                    // The due listing guarantees both fields, but a document
                    // edited mid-pass could drop one.
                    let (Some(cycle), Some(current)) = (&sub.billing_cycle, sub.next_charge_date)
                    else {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        return;
                    };

                    let advanced = billing::advance_next_charge(cycle, current, as_of);
                    if advanced == current {
                        tracing::debug!(
                            subscription_id = %sub.id,
                            cycle = %cycle,
                            "Cannot advance, skipping"
                        );
                        skipped.fetch_add(1, Ordering::Relaxed);
                        return;
                    }

                    match self
                        .repo
                        .update_subscription_next_charge(&sub.id, advanced)
                        .await
                    {
                        Ok(()) => {
                            updated.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                subscription_id = %sub.id,
                                from = %current,
                                to = %advanced,
                                "Advanced next charge date"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                subscription_id = %sub.id,
                                error = %e,
                                "Failed to persist advanced date"
                            );
                            failures.lock().await.push(RolloverFailure {
                                subscription_id: sub.id.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            })
            .await;

        let failures = Arc::try_unwrap(failures)
            .expect("All rollovers completed, should have sole ownership")
            .into_inner();

        RolloverOutcome {
            updated: updated.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
            failed: failures.len() as u32,
            failures,
        }
    }

    // ─── Notification Pass ───────────────────────────────────────────────

    /// Aggregate and dispatch every user's charge window.
    ///
    /// One rate snapshot and one timestamp serve the whole pass, so all
    /// users see the same rates and marker value. Per-user failures land in
    /// the outcome without aborting the pass.
    pub async fn run_notification_pass(
        &self,
        as_of: NaiveDate,
        mode: PassMode,
    ) -> Result<NotificationPassOutcome> {
        let users = self.repo.list_users().await?;
        let snapshot = self.rates.fetch().await;
        let sent_at = Utc::now();

        tracing::info!(
            as_of = %as_of,
            users = users.len(),
            rate_source = ?snapshot.source,
            mode = ?mode,
            "Starting notification pass"
        );

        let outcomes = Arc::new(tokio::sync::Mutex::new(Vec::with_capacity(users.len())));

        stream::iter(users)
            .for_each_concurrent(MAX_CONCURRENT_USERS, |user| {
                let outcomes = Arc::clone(&outcomes);
                let snapshot = &snapshot;
                async move {
                    let user_id = user.id.clone();
                    let result = self
                        .process_user(&user, as_of, snapshot, mode, sent_at)
                        .await;
                    if let UserPassResult::Failed(reason) = &result {
                        tracing::warn!(
                            user_id = %user_id,
                            reason = %reason,
                            "User skipped in notification pass"
                        );
                    }
                    outcomes.lock().await.push(UserPassOutcome { user_id, result });
                }
            })
            .await;

        let mut outcomes = Arc::try_unwrap(outcomes)
            .expect("All users processed, should have sole ownership")
            .into_inner();
        outcomes.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let outcome = NotificationPassOutcome {
            rate_source: snapshot.source,
            outcomes,
        };

        tracing::info!(
            processed = outcome.processed(),
            notified = outcome.notified(),
            nothing_due = outcome.nothing_due(),
            failed = outcome.failed(),
            "Notification pass complete"
        );

        Ok(outcome)
    }

    async fn process_user(
        &self,
        user: &User,
        as_of: NaiveDate,
        snapshot: &RateSnapshot,
        mode: PassMode,
        sent_at: DateTime<Utc>,
    ) -> UserPassResult {
        let window = match self
            .window_for_user(&user.id, user.notify_days(), as_of, snapshot)
            .await
        {
            Ok(window) => window,
            Err(e) => return UserPassResult::Failed(e.to_string()),
        };

        match mode {
            PassMode::PreviewOnly => UserPassResult::Previewed {
                count: window.count,
                total_huf: window.total_huf,
            },
            PassMode::Full => match self.notifier.dispatch(user, &window, sent_at).await {
                DispatchOutcome::NothingToSend => UserPassResult::NothingDue,
                DispatchOutcome::Dispatched(report) => UserPassResult::Notified(report),
            },
        }
    }

    async fn window_for_user(
        &self,
        user_id: &str,
        notify_days: u32,
        as_of: NaiveDate,
        snapshot: &RateSnapshot,
    ) -> Result<ChargeWindow> {
        let to = as_of
            .checked_add_days(Days::new(u64::from(notify_days)))
            .unwrap_or(NaiveDate::MAX);
        let subscriptions = self
            .repo
            .list_subscriptions_in_range(user_id, as_of, to)
            .await?;
        Ok(window::compute_window(
            &subscriptions,
            as_of,
            notify_days,
            snapshot,
        ))
    }

    // ─── Single-User Operations ──────────────────────────────────────────

    /// Aggregate one user's window without dispatching anything.
    pub async fn preview_window(&self, user_id: &str, as_of: NaiveDate) -> Result<ChargeWindow> {
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let snapshot = self.rates.fetch().await;
        self.window_for_user(&user.id, user.notify_days(), as_of, &snapshot)
            .await
    }

    /// Dispatch one user's window immediately, outside any pass.
    pub async fn send_now(&self, user_id: &str) -> Result<DispatchOutcome> {
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let sent_at = Utc::now();
        let as_of = sent_at.date_naive();
        let snapshot = self.rates.fetch().await;
        let window = self
            .window_for_user(&user.id, user.notify_days(), as_of, &snapshot)
            .await?;

        Ok(self.notifier.dispatch(&user, &window, sent_at).await)
    }
}
