// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription model and its enumerated fields.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Currency of a subscription price.
///
/// Serialized as its uppercase code. Codes outside the supported set are kept
/// verbatim in `Other` so historical records always deserialize; normalization
/// treats them as already-HUF amounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Currency {
    Huf,
    Eur,
    Usd,
    Other(String),
}

impl Currency {
    /// Parse a currency code (case-insensitive).
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "HUF" => Currency::Huf,
            "EUR" => Currency::Eur,
            "USD" => Currency::Usd,
            other => Currency::Other(other.to_string()),
        }
    }

    /// The code this currency serializes as.
    pub fn code(&self) -> &str {
        match self {
            Currency::Huf => "HUF",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Other(code) => code,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Currency::from_code(&code))
    }
}

/// Recurrence unit of a subscription's charge.
///
/// `Other` carries unrecognized historical values; the date advancer treats
/// them as cannot-advance instead of failing at the serde layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BillingCycle {
    Monthly,
    Yearly,
    Other(String),
}

impl BillingCycle {
    /// Parse a billing-cycle value (case-insensitive).
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "monthly" => BillingCycle::Monthly,
            "yearly" => BillingCycle::Yearly,
            other => BillingCycle::Other(other.to_string()),
        }
    }

    /// The value this cycle serializes as.
    pub fn code(&self) -> &str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
            BillingCycle::Other(code) => code,
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for BillingCycle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for BillingCycle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(BillingCycle::from_code(&code))
    }
}

/// A recurring charge tracked for one user. Stored in Firestore and returned
/// as-is by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Subscription {
    /// Document ID (UUID v4, assigned at creation)
    pub id: String,
    /// Owning user's ID
    pub user_id: String,
    /// Display name (e.g., "Netflix")
    pub name: String,
    /// Price per cycle, in `currency`
    pub price: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub currency: Currency,
    /// None is a valid terminal state: no further advancement
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub billing_cycle: Option<BillingCycle>,
    /// Day-granularity due date; None means never charged again
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub next_charge_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}
