// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing-cycle date arithmetic.

use chrono::{Months, NaiveDate};

use crate::models::BillingCycle;

/// One cycle step forward from `date`.
///
/// Month arithmetic preserves the day of month and saturates to the last day
/// of shorter target months (Jan 31 + 1 month = Feb 29 in a leap year).
/// Returns `None` for unrecognized cycles and at the end of the supported
/// calendar range.
pub fn cycle_step(cycle: &BillingCycle, date: NaiveDate) -> Option<NaiveDate> {
    match cycle {
        BillingCycle::Monthly => date.checked_add_months(Months::new(1)),
        BillingCycle::Yearly => date.checked_add_months(Months::new(12)),
        BillingCycle::Other(_) => None,
    }
}

/// Advance a stale next-charge date past `reference` by repeated cycle steps.
///
/// Returns the first step-reachable date strictly after `reference`. Dates
/// already past `reference` come back unchanged, as does any date whose cycle
/// cannot step; callers treat "unchanged and still due" as cannot-advance.
pub fn advance_next_charge(
    cycle: &BillingCycle,
    date: NaiveDate,
    reference: NaiveDate,
) -> NaiveDate {
    let mut next = date;
    while next <= reference {
        match cycle_step(cycle, next) {
            Some(stepped) => next = stepped,
            None => break,
        }
    }
    next
}
