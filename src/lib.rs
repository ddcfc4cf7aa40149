// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Subtrack: recurring-charge tracking with scheduled reminders
//!
//! This crate provides the backend API for tracking subscription charges,
//! rolling their due dates forward, and notifying users about upcoming
//! charges in their preferred window.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DynRepo;
use services::{RatesClient, Scheduler};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub repo: DynRepo,
    pub rates: RatesClient,
    pub scheduler: Scheduler,
}
