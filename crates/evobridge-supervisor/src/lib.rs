// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnection supervisor for Evobridge instances.
//!
//! Periodically classifies every monitorable WhatsApp instance, remediates
//! unhealthy ones against the session gateway within a bounded retry
//! budget, and reports what it did through a [`NotificationSink`].
//!
//! [`NotificationSink`]: evobridge_core::NotificationSink

pub mod classify;
pub mod retry;
pub mod settings;
pub mod supervisor;
pub mod system;

pub use classify::{Verdict, classify};
pub use retry::{Attempt, RetryBudget};
pub use settings::SupervisorSettings;
pub use supervisor::{CheckSummary, FullHealthReport, RetryEntry, ServiceStats, Supervisor};
