// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification sink for supervisor events.

use crate::events::SupervisorEvent;

/// Fire-and-forget delivery of supervisor events.
///
/// `publish` must never block the caller and never fail. Implementations
/// drop events they cannot deliver.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: SupervisorEvent);
}

/// Sink that discards everything. Used by one-shot CLI commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn publish(&self, event: SupervisorEvent) {
        tracing::trace!(event = event.kind(), "event discarded");
    }
}
