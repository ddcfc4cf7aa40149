// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and parsing.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::AppError;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Resolve an optional `as_of` parameter (ISO `YYYY-MM-DD`) to a date,
/// defaulting to today (UTC). Pass entry points take explicit dates so tests
/// and operators can replay arbitrary days.
pub fn resolve_as_of(param: Option<&str>) -> Result<NaiveDate, AppError> {
    match param {
        None => Ok(Utc::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(format!("Invalid as_of date: {}", raw))),
    }
}
