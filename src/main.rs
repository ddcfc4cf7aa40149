// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subtrack API Server
//!
//! Tracks recurring subscription charges, advances their due dates on a
//! schedule, and notifies users about charges coming up in their window.

use std::sync::Arc;
use subtrack::{
    config::Config,
    db::{DynRepo, FirestoreDb},
    services::{MailClient, Notifier, PushClient, RatesClient, Scheduler},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Subtrack API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");
    let repo: DynRepo = Arc::new(db);

    // Exchange-rate client (shared by the API and the scheduler)
    let rates = RatesClient::new(&config.rate_api_base);

    // Notification transports
    if config.push_server_key.is_none() {
        tracing::warn!("PUSH_SERVER_KEY not set, push delivery disabled");
    }
    let push = PushClient::new(&config.push_endpoint, config.push_server_key.clone());
    let mail = MailClient::new(
        &config.mail_api_base,
        &config.mail_api_token,
        &config.mail_from,
    );
    let notifier = Notifier::new(repo.clone(), push, mail);

    let scheduler = Scheduler::new(repo.clone(), rates.clone(), notifier);
    tracing::info!("Scheduler initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        repo,
        rates,
        scheduler,
    });

    // Build router
    let app = subtrack::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("subtrack=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
