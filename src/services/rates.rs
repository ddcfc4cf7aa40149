// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exchange-rate client and currency normalization.
//!
//! Rates come from the Frankfurter API and are inverted into HUF-per-unit
//! form. Every failure mode degrades to a pinned fallback table so a rate
//! outage can never take the notification pass down with it.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Currency;

/// The currency every amount is normalized into before aggregation.
pub const COMPARISON_CURRENCY: Currency = Currency::Huf;

/// Pinned fallback rates, HUF per one unit.
pub const FALLBACK_EUR_HUF: f64 = 385.0;
pub const FALLBACK_USD_HUF: f64 = 355.0;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a snapshot's rates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Live,
    Fallback,
}

/// Conversion table used for one whole scheduling pass.
///
/// Fetched once per pass so every user's totals are computed against the
/// same rates.
#[derive(Debug, Clone, Serialize)]
pub struct RateSnapshot {
    rates: HashMap<Currency, f64>,
    pub source: RateSource,
}

impl RateSnapshot {
    /// Snapshot built from the pinned fallback table.
    pub fn fallback() -> Self {
        Self {
            rates: HashMap::from([
                (Currency::Eur, FALLBACK_EUR_HUF),
                (Currency::Usd, FALLBACK_USD_HUF),
            ]),
            source: RateSource::Fallback,
        }
    }

    /// Snapshot from live rates, HUF per one unit of the keyed currency.
    pub fn with_rates(rates: HashMap<Currency, f64>) -> Self {
        Self {
            rates,
            source: RateSource::Live,
        }
    }

    pub fn rate(&self, currency: &Currency) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    /// Convert `amount` into the comparison currency.
    ///
    /// HUF amounts pass through unchanged, as do currencies with no entry in
    /// the table; an unrecognized currency must never sink the whole total.
    pub fn normalize(&self, amount: f64, currency: &Currency) -> f64 {
        if *currency == COMPARISON_CURRENCY {
            return amount;
        }
        match self.rate(currency) {
            Some(rate) => amount * rate,
            None => amount,
        }
    }
}

/// Frankfurter API client.
#[derive(Clone)]
pub struct RatesClient {
    http: Option<reqwest::Client>,
    base_url: String,
}

impl RatesClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a mock rates client for testing (offline mode).
    ///
    /// Fetches resolve to the fallback table without touching the network.
    pub fn new_mock() -> Self {
        Self {
            http: None,
            base_url: "http://localhost:0".to_string(),
        }
    }

    /// Fetch a snapshot for one pass. Infallible: on any error the fallback
    /// table is returned and the failure is logged.
    pub async fn fetch(&self) -> RateSnapshot {
        let Some(http) = &self.http else {
            tracing::debug!("Rates client in offline mode, using fallback table");
            return RateSnapshot::fallback();
        };

        match self.fetch_live(http).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Exchange rate fetch failed, using fallback table");
                RateSnapshot::fallback()
            }
        }
    }

    async fn fetch_live(&self, http: &reqwest::Client) -> Result<RateSnapshot> {
        let url = format!("{}/latest", self.base_url);

        let response = http
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .query(&[("from", "HUF"), ("to", "EUR,USD")])
            .send()
            .await
            .map_err(|e| AppError::RateApi(e.to_string()))?;

        let payload: RatePayload = self.check_response_json(response).await?;
        Ok(snapshot_from_payload(&payload))
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RateApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RateApi(format!("Invalid rate payload: {}", e)))
    }
}

/// Frankfurter `/latest?from=HUF` payload. Rates are foreign units per 1 HUF.
#[derive(Debug, Deserialize)]
struct RatePayload {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Invert a Frankfurter payload into HUF-per-unit rates.
///
/// A missing, zero, negative, or non-finite entry degrades to the pinned
/// fallback for that currency only.
fn snapshot_from_payload(payload: &RatePayload) -> RateSnapshot {
    let eur = invert(payload.rates.get("EUR")).unwrap_or(FALLBACK_EUR_HUF);
    let usd = invert(payload.rates.get("USD")).unwrap_or(FALLBACK_USD_HUF);

    RateSnapshot::with_rates(HashMap::from([
        (Currency::Eur, eur),
        (Currency::Usd, usd),
    ]))
}

fn invert(rate: Option<&f64>) -> Option<f64> {
    match rate {
        Some(r) if r.is_finite() && *r > 0.0 => Some(1.0 / r),
        _ => None,
    }
}
