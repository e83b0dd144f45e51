// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted by the reconnection supervisor.
//!
//! Events are serialized as JSON objects tagged with a kebab-case `type`
//! field, which is the shape WebSocket subscribers receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{HealthStatus, TenantId};

/// Why the supervisor considered an instance unhealthy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum UnhealthyReason {
    /// Gateway reports the session is not open.
    EvolutionDisconnected,
    /// Persisted as connected but silent for longer than the staleness window.
    InactiveConnection,
    /// Gateway does not know the session at all.
    SessionMissing,
}

/// Process-level health figures attached to a full health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub uptime_secs: u64,
    /// Resident memory of this process in bytes, when available.
    pub memory_bytes: Option<u64>,
    pub status: HealthStatus,
}

/// A notification produced by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SupervisorEvent {
    ReconnectionAttempt {
        instance: String,
        attempt: u32,
        max_retries: u32,
    },
    ReconnectionSuccess {
        instance: String,
        tenant_id: TenantId,
    },
    InstanceFailed {
        instance: String,
        tenant_id: TenantId,
        reason: String,
    },
    FullHealthCheck {
        evolution_health: HealthStatus,
        database_health: HealthStatus,
        system_health: SystemHealth,
        timestamp: DateTime<Utc>,
    },
    ServiceStarted {
        timestamp: DateTime<Utc>,
    },
    ServiceStopped {
        timestamp: DateTime<Utc>,
    },
    CheckError {
        message: String,
    },
}

impl SupervisorEvent {
    /// The kebab-case event name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            SupervisorEvent::ReconnectionAttempt { .. } => "reconnection-attempt",
            SupervisorEvent::ReconnectionSuccess { .. } => "reconnection-success",
            SupervisorEvent::InstanceFailed { .. } => "instance-failed",
            SupervisorEvent::FullHealthCheck { .. } => "full-health-check",
            SupervisorEvent::ServiceStarted { .. } => "service-started",
            SupervisorEvent::ServiceStopped { .. } => "service-stopped",
            SupervisorEvent::CheckError { .. } => "check-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_kebab_case() {
        assert_eq!(
            UnhealthyReason::EvolutionDisconnected.to_string(),
            "evolution-disconnected"
        );
        assert_eq!(
            UnhealthyReason::InactiveConnection.to_string(),
            "inactive-connection"
        );
        assert_eq!(
            "session-missing".parse::<UnhealthyReason>().unwrap(),
            UnhealthyReason::SessionMissing
        );
    }

    #[test]
    fn attempt_event_serializes_with_type_tag() {
        let event = SupervisorEvent::ReconnectionAttempt {
            instance: "T1_wa_3".into(),
            attempt: 2,
            max_retries: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reconnection-attempt");
        assert_eq!(json["instance"], "T1_wa_3");
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["max_retries"], 3);
        assert_eq!(event.kind(), "reconnection-attempt");
    }

    #[test]
    fn failed_event_round_trips() {
        let event = SupervisorEvent::InstanceFailed {
            instance: "T1_wa_1".into(),
            tenant_id: TenantId::new("T1"),
            reason: "max_reconnection_attempts_exceeded".into(),
        };
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains("\"type\":\"instance-failed\""));
        assert!(text.contains("\"tenant_id\":\"T1\""));
        let back: SupervisorEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn health_event_nests_statuses() {
        let event = SupervisorEvent::FullHealthCheck {
            evolution_health: HealthStatus::Unhealthy("connection refused".into()),
            database_health: HealthStatus::Healthy,
            system_health: SystemHealth {
                uptime_secs: 12,
                memory_bytes: None,
                status: HealthStatus::Healthy,
            },
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "full-health-check");
        assert_eq!(json["evolution_health"]["status"], "unhealthy");
        assert_eq!(json["evolution_health"]["detail"], "connection refused");
        assert_eq!(json["database_health"]["status"], "healthy");
    }
}
