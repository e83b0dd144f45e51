// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of supervisor events to WebSocket subscribers.
//!
//! The hub drains the sink's queue and rebroadcasts every event on a
//! `tokio::broadcast` channel. Slow subscribers lag and miss events rather
//! than blocking the drain.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use evobridge_core::SupervisorEvent;

#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<SupervisorEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: SupervisorEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Forwards everything from `rx` until the queue closes or `cancel` fires.
    pub fn spawn_drain(
        &self,
        mut rx: mpsc::Receiver<SupervisorEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => {
                            let kind = event.kind();
                            let delivered = hub.publish(event);
                            tracing::trace!(event = kind, delivered, "event broadcast");
                        }
                        None => break,
                    },
                    _ = cancel.cancelled() => {
                        // Flush what is already queued, e.g. service-stopped.
                        while let Ok(event) = rx.try_recv() {
                            hub.publish(event);
                        }
                        break;
                    }
                }
            }
            tracing::debug!("event hub drain stopped");
        })
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(crate::sink::DEFAULT_EVENT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use evobridge_core::NotificationSink;

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let hub = EventHub::new(8);
        assert_eq!(
            hub.publish(SupervisorEvent::CheckError {
                message: "x".into()
            }),
            0
        );
    }

    #[tokio::test]
    async fn drain_fans_out_to_every_subscriber() {
        let hub = EventHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        let (sink, rx) = ChannelSink::channel(8);
        let cancel = CancellationToken::new();
        let drain = hub.spawn_drain(rx, cancel.clone());

        let event = SupervisorEvent::CheckError {
            message: "registry down".into(),
        };
        sink.publish(event.clone());

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);

        cancel.cancel();
        drain.await.unwrap();
    }
}
