// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-queue notification sink.
//!
//! The supervisor publishes into a bounded mpsc queue with `try_send`; when
//! the queue is full the event is dropped with a warning. Delivery is at
//! most once.

use tokio::sync::mpsc;

use evobridge_core::{NotificationSink, SupervisorEvent};

/// Default queue capacity.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SupervisorEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiving half the event hub drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn publish(&self, event: SupervisorEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(event = event.kind(), "event queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!(event = event.kind(), "event queue closed, dropping event");
            }
        }
    }
}
