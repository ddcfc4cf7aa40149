//! Application configuration loaded from environment variables.
//!
//! Secrets (JWT signing key, scheduler token, mail relay token) are injected
//! as environment variables by the deployment platform and read once at
//! startup.

use std::env;

/// Default lookahead for the notification window, in days.
pub const DEFAULT_NOTIFY_DAYS_BEFORE: u32 = 7;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Base URL of the exchange-rate API (Frankfurter-compatible)
    pub rate_api_base: String,
    /// Push delivery endpoint (FCM legacy HTTP)
    pub push_endpoint: String,
    /// Base URL of the HTTP mail relay
    pub mail_api_base: String,
    /// From address for notification emails
    pub mail_from: String,

    // --- Secrets (injected as env vars) ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared secret presented by the external cron scheduler on /tasks/*
    pub scheduler_token: String,
    /// Mail relay API token
    pub mail_api_token: String,
    /// FCM server key; push delivery is disabled when unset
    pub push_server_key: Option<String>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            rate_api_base: "https://api.frankfurter.dev/v1".to_string(),
            push_endpoint: "https://fcm.googleapis.com/fcm/send".to_string(),
            mail_api_base: "http://localhost:9925".to_string(),
            mail_from: "Subtrack <noreply@subtrack.app>".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            scheduler_token: "test_scheduler_token".to_string(),
            mail_api_token: "test_mail_token".to_string(),
            push_server_key: Some("test_push_key".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            rate_api_base: env::var("RATE_API_BASE")
                .unwrap_or_else(|_| "https://api.frankfurter.dev/v1".to_string()),
            push_endpoint: env::var("PUSH_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".to_string()),
            mail_api_base: env::var("MAIL_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("MAIL_API_BASE"))?,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Subtrack <noreply@subtrack.app>".to_string()),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            scheduler_token: env::var("SCHEDULER_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SCHEDULER_TOKEN"))?,
            mail_api_token: env::var("MAIL_API_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("MAIL_API_TOKEN"))?,
            push_server_key: env::var("PUSH_SERVER_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
