// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Evobridge instance supervisor.
//!
//! This crate provides the domain types, the error type, the supervisor
//! event model, and the collaborator traits (registry, session gateway,
//! notification sink) that the rest of the workspace implements.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::EvobridgeError;
pub use events::{SupervisorEvent, SystemHealth, UnhealthyReason};
pub use types::{
    ConnectionReport, ConnectionState, HealthSnapshot, HealthStatus, Instance, InstanceKey,
    InstanceStatus, MAX_ATTEMPTS_EXCEEDED, MAX_SLOTS, ReconnectPayload, SlotPosition, TenantId,
};

pub use traits::sink::NullSink;
pub use traits::{InstanceRegistry, NotificationSink, SessionGateway};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evobridge_error_has_all_variants() {
        let _config = EvobridgeError::Config("test".into());
        let _storage = EvobridgeError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _gateway = EvobridgeError::gateway("test");
        let _not_found = EvobridgeError::InstanceNotFound {
            key: "T1#1".into(),
        };
        let _slot = EvobridgeError::InvalidSlot(9);
        let _timeout = EvobridgeError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = EvobridgeError::Internal("test".into());
    }

    #[test]
    fn error_display_messages() {
        assert_eq!(
            EvobridgeError::InvalidSlot(7).to_string(),
            "invalid slot position 7: must be between 1 and 5"
        );
        assert_eq!(
            EvobridgeError::InstanceNotFound { key: "T1#2".into() }.to_string(),
            "instance not found: T1#2"
        );
        let timeout = EvobridgeError::Timeout {
            duration: std::time::Duration::from_secs(5),
        };
        assert!(timeout.to_string().contains("5s"));
    }

    #[test]
    fn transient_classification() {
        assert!(EvobridgeError::gateway("503").is_transient());
        assert!(
            EvobridgeError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(!EvobridgeError::Config("bad".into()).is_transient());
        assert!(!EvobridgeError::InvalidSlot(0).is_transient());
    }

    #[test]
    fn null_sink_accepts_events() {
        let sink: &dyn NotificationSink = &NullSink;
        sink.publish(SupervisorEvent::CheckError {
            message: "ignored".into(),
        });
    }

    struct DeleteFails;

    #[async_trait::async_trait]
    impl SessionGateway for DeleteFails {
        async fn connection_state(&self, _session: &str) -> ConnectionReport {
            ConnectionReport::new(ConnectionState::Open)
        }
        async fn request_reconnect(
            &self,
            _session: &str,
        ) -> Result<Option<ReconnectPayload>, EvobridgeError> {
            Ok(None)
        }
        async fn restart(&self, _session: &str) -> Result<(), EvobridgeError> {
            Ok(())
        }
        async fn delete_session(&self, _session: &str) -> Result<(), EvobridgeError> {
            Err(EvobridgeError::gateway("404 not found"))
        }
        async fn create_session(&self, session: &str) -> Result<(), EvobridgeError> {
            if session == "bad" {
                Err(EvobridgeError::gateway("create failed"))
            } else {
                Ok(())
            }
        }
        async fn logout(&self, _session: &str) -> Result<(), EvobridgeError> {
            Ok(())
        }
        async fn health_check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recreate_tolerates_failed_delete() {
        let gw = DeleteFails;
        let started = tokio::time::Instant::now();
        gw.recreate("T1_wa_1", std::time::Duration::from_secs(2))
            .await
            .unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_secs(2));
        assert!(
            gw.recreate("bad", std::time::Duration::from_secs(2))
                .await
                .is_err()
        );
    }
}
