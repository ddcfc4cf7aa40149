// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod billing;
pub mod notify;
pub mod rates;
pub mod scheduler;
pub mod window;

pub use notify::{MailClient, Notifier, PushClient};
pub use rates::RatesClient;
pub use scheduler::Scheduler;
