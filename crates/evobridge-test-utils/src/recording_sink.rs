// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification sink that records every published event.

use std::sync::Mutex;

use evobridge_core::{NotificationSink, SupervisorEvent};

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SupervisorEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in publish order.
    pub fn events(&self) -> Vec<SupervisorEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of events whose `type` tag equals `kind`.
    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }

    /// Event kinds in publish order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(SupervisorEvent::kind).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, event: SupervisorEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
