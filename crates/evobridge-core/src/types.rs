// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the registry, gateway client, and supervisor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::EvobridgeError;

/// Maximum number of WhatsApp session slots a tenant may own.
pub const MAX_SLOTS: u8 = 5;

/// Failure reason recorded when the retry budget of an instance is exhausted.
pub const MAX_ATTEMPTS_EXCEEDED: &str = "max_reconnection_attempts_exceeded";

/// Identifier of the tenant (CRM location) that owns a set of instances.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tenant ids become part of session names, so they are limited to
    /// ASCII alphanumerics, `-` and `_`, at most 64 characters, and may not
    /// contain the `_wa_` separator.
    pub fn is_valid(raw: &str) -> bool {
        !raw.is_empty()
            && raw.len() <= 64
            && !raw.contains("_wa_")
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a session slot within a tenant, always in `1..=MAX_SLOTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotPosition(u8);

impl SlotPosition {
    /// Validates and wraps a slot number.
    pub fn new(position: u8) -> Result<Self, EvobridgeError> {
        if (1..=MAX_SLOTS).contains(&position) {
            Ok(Self(position))
        } else {
            Err(EvobridgeError::InvalidSlot(position))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All valid slot positions in ascending order.
    pub fn all() -> impl Iterator<Item = SlotPosition> {
        (1..=MAX_SLOTS).map(SlotPosition)
    }
}

impl<'de> Deserialize<'de> for SlotPosition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        SlotPosition::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for SlotPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed identity of one session slot: `(tenant, slot)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub tenant_id: TenantId,
    pub slot: SlotPosition,
}

impl InstanceKey {
    pub fn new(tenant_id: TenantId, slot: SlotPosition) -> Self {
        Self { tenant_id, slot }
    }

    /// The instance name used on the session gateway, e.g. `loc123_wa_2`.
    pub fn session_name(&self) -> String {
        format!("{}_wa_{}", self.tenant_id, self.slot)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tenant_id, self.slot)
    }
}

/// Persisted lifecycle status of an instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Provisioned but never connected; not monitored unless recently seen.
    Inactive,
    /// A QR code was issued and is waiting to be scanned.
    QrPending,
    /// The gateway is (re)establishing the session.
    Connecting,
    /// Session is open. Older rows may carry the raw gateway state `open`.
    #[strum(to_string = "connected", serialize = "open")]
    Connected,
    /// The gateway reported the session closed.
    Disconnected,
    /// Retry budget exhausted; requires manual action to clear.
    Failed,
}

impl InstanceStatus {
    /// Statuses that are always monitorable regardless of activity.
    pub fn is_active(self) -> bool {
        matches!(self, InstanceStatus::Connected | InstanceStatus::Connecting)
    }
}

/// Authoritative state record for one `(tenant, slot)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub key: InstanceKey,
    /// Gateway-side instance name derived from the key.
    pub session_name: String,
    pub status: InstanceStatus,
    pub phone_number: Option<String>,
    /// Opaque QR payload, only present while `qr_pending`.
    pub qr_payload: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub connected_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
    /// Persisted remediation count, kept for diagnostics.
    pub reconnect_attempts: u32,
    pub last_reconnect_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// A freshly provisioned, never-connected slot.
    pub fn provisioned(key: InstanceKey, now: DateTime<Utc>) -> Self {
        Self {
            session_name: key.session_name(),
            key,
            status: InstanceStatus::Inactive,
            phone_number: None,
            qr_payload: None,
            last_seen_at: None,
            connected_at: None,
            disconnected_at: None,
            reconnect_attempts: 0,
            last_reconnect_at: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Live session state as reported by the gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Open,
    Connecting,
    Close,
    Unknown,
}

impl ConnectionState {
    /// Parses a gateway state string; anything unrecognised is `Unknown`.
    pub fn from_gateway(raw: &str) -> Self {
        raw.parse().unwrap_or(ConnectionState::Unknown)
    }
}

/// Result of a connection-state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub state: ConnectionState,
    /// Human-readable detail (gateway message, timeout cause).
    pub detail: Option<String>,
    /// The gateway does not know the session at all.
    pub not_found: bool,
}

impl ConnectionReport {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            detail: None,
            not_found: false,
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Unknown,
            detail: Some(detail.into()),
            not_found: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            state: ConnectionState::Unknown,
            detail: Some("session not found on gateway".to_string()),
            not_found: true,
        }
    }
}

/// What the gateway handed back when asked to reconnect a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPayload {
    /// A pairing QR was issued.
    Qr { code: String, data_url: String },
    /// The session resumed without needing a scan.
    Resumed,
}

impl ReconnectPayload {
    /// The QR data URL, if this payload carries one.
    pub fn qr_data_url(&self) -> Option<&str> {
        match self {
            ReconnectPayload::Qr { data_url, .. } => Some(data_url),
            ReconnectPayload::Resumed => None,
        }
    }
}

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Fleet-wide health aggregate produced by every connection check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub healthy: usize,
    pub total: usize,
    /// Percentage of healthy instances, rounded; 0 when there are none.
    pub health_rate: u32,
    pub checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn new(healthy: usize, total: usize, checked_at: DateTime<Utc>) -> Self {
        let health_rate = if total > 0 {
            ((healthy as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        Self {
            healthy,
            total,
            health_rate,
            checked_at,
        }
    }
}

/// Format a timestamp the way the registry stores it (`2026-01-01T00:00:00.000Z`).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_position_bounds() {
        assert!(SlotPosition::new(0).is_err());
        assert!(SlotPosition::new(6).is_err());
        for n in 1..=5 {
            assert_eq!(SlotPosition::new(n).unwrap().get(), n);
        }
        assert_eq!(SlotPosition::all().count(), 5);
    }

    #[test]
    fn slot_position_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<SlotPosition>("3").is_ok());
        assert!(serde_json::from_str::<SlotPosition>("9").is_err());
    }

    #[test]
    fn tenant_ids_are_restricted() {
        assert!(TenantId::is_valid("jtEqGdhkoR6iePmZaCmd"));
        assert!(TenantId::is_valid("acme-corp_2"));
        assert!(!TenantId::is_valid(""));
        assert!(!TenantId::is_valid("a b"));
        assert!(!TenantId::is_valid("x_wa_1"));
        assert!(!TenantId::is_valid(&"a".repeat(65)));
    }

    #[test]
    fn session_name_format() {
        let key = InstanceKey::new(TenantId::new("T1"), SlotPosition::new(3).unwrap());
        assert_eq!(key.session_name(), "T1_wa_3");
        assert_eq!(key.to_string(), "T1#3");
    }

    #[test]
    fn instance_status_strings() {
        assert_eq!(InstanceStatus::QrPending.to_string(), "qr_pending");
        assert_eq!(
            "qr_pending".parse::<InstanceStatus>().unwrap(),
            InstanceStatus::QrPending
        );
        assert_eq!(
            "open".parse::<InstanceStatus>().unwrap(),
            InstanceStatus::Connected
        );
        assert_eq!(InstanceStatus::Connected.to_string(), "connected");
        assert!("bogus".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn connection_state_from_gateway() {
        assert_eq!(ConnectionState::from_gateway("open"), ConnectionState::Open);
        assert_eq!(ConnectionState::from_gateway("close"), ConnectionState::Close);
        assert_eq!(
            ConnectionState::from_gateway("refused"),
            ConnectionState::Unknown
        );
    }

    #[test]
    fn health_snapshot_rate() {
        let now = Utc::now();
        assert_eq!(HealthSnapshot::new(2, 3, now).health_rate, 67);
        assert_eq!(HealthSnapshot::new(0, 0, now).health_rate, 0);
        assert_eq!(HealthSnapshot::new(5, 5, now).health_rate, 100);
    }

    #[test]
    fn timestamp_format_is_sortable() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2026-01-02T03:04:05.000Z");
    }
}
