// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification-window selection and aggregation.

use chrono::{Days, NaiveDate};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Currency, Subscription};
use crate::services::rates::RateSnapshot;

/// One upcoming charge inside a user's notification window.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UpcomingCharge {
    pub subscription_id: String,
    pub name: String,
    /// Price in the subscription's own currency, not normalized
    pub price: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub currency: Currency,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub next_charge_date: NaiveDate,
    /// Days from the reference date; 0 means due on the reference day
    pub days_until_charge: i64,
}

/// Aggregated charge window for one user.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChargeWindow {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub reference_date: NaiveDate,
    pub notify_days_before: u32,
    pub count: u32,
    /// Whole-HUF estimate, rounded once over the summed total
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_huf: i64,
    pub items: Vec<UpcomingCharge>,
}

/// Select charges due in `[reference, reference + notify_days]` (bounds
/// inclusive) and aggregate their normalized total.
///
/// Items are ordered by due date, then by subscription ID for a stable tie
/// order. Subscriptions without a next charge date never qualify. Rounding
/// happens exactly once, over the summed total, so per-item fractions cannot
/// accumulate drift.
pub fn compute_window(
    subscriptions: &[Subscription],
    reference: NaiveDate,
    notify_days: u32,
    rates: &RateSnapshot,
) -> ChargeWindow {
    let window_end = reference
        .checked_add_days(Days::new(u64::from(notify_days)))
        .unwrap_or(NaiveDate::MAX);

    let mut items: Vec<UpcomingCharge> = subscriptions
        .iter()
        .filter_map(|sub| {
            let due = sub.next_charge_date?;
            if due < reference || due > window_end {
                return None;
            }
            Some(UpcomingCharge {
                subscription_id: sub.id.clone(),
                name: sub.name.clone(),
                price: sub.price,
                currency: sub.currency.clone(),
                next_charge_date: due,
                days_until_charge: (due - reference).num_days(),
            })
        })
        .collect();

    items.sort_by(|a, b| {
        a.next_charge_date
            .cmp(&b.next_charge_date)
            .then_with(|| a.subscription_id.cmp(&b.subscription_id))
    });

    let total: f64 = items
        .iter()
        .map(|item| rates.normalize(item.price, &item.currency))
        .sum();

    ChargeWindow {
        reference_date: reference,
        notify_days_before: notify_days,
        count: items.len() as u32,
        total_huf: total.round() as i64,
        items,
    }
}
