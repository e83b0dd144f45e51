// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance registry trait: the authoritative store of instance state.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::EvobridgeError;
use crate::types::{HealthSnapshot, HealthStatus, Instance, InstanceKey, TenantId};

/// Persistent store of every `(tenant, slot)` instance.
///
/// Mutations on a key with no row return [`EvobridgeError::InstanceNotFound`].
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    /// Creates one `inactive` row per slot for the tenant. Idempotent:
    /// existing rows are left untouched. Returns the tenant's instances.
    async fn provision_tenant(&self, tenant: &TenantId) -> Result<Vec<Instance>, EvobridgeError>;

    /// Deletes every instance of the tenant. Returns the number of rows removed.
    async fn remove_tenant(&self, tenant: &TenantId) -> Result<usize, EvobridgeError>;

    async fn get_instance(&self, key: &InstanceKey) -> Result<Option<Instance>, EvobridgeError>;

    /// Looks up an instance by its gateway session name.
    async fn find_by_session_name(&self, name: &str) -> Result<Option<Instance>, EvobridgeError>;

    /// All instances, optionally restricted to one tenant, ordered by (tenant, slot).
    async fn list_instances(
        &self,
        tenant: Option<&TenantId>,
    ) -> Result<Vec<Instance>, EvobridgeError>;

    /// Instances eligible for health checking: status `connected` or
    /// `connecting` (including the legacy `open`), or `last_seen_at` within
    /// `window` of `now`. Ordered by (tenant, slot).
    async fn list_monitorable(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Instance>, EvobridgeError>;

    /// Status `connecting`, `last_seen_at = now`, persisted attempts + 1,
    /// `last_reconnect_at = now`.
    async fn mark_reconnecting(&self, key: &InstanceKey) -> Result<(), EvobridgeError>;

    /// Status `failed` with the given reason.
    async fn mark_failed(&self, key: &InstanceKey, reason: &str) -> Result<(), EvobridgeError>;

    /// Status `connected`; resets persisted attempts and clears any QR or
    /// failure reason.
    async fn mark_healthy(
        &self,
        key: &InstanceKey,
        phone_number: Option<&str>,
    ) -> Result<(), EvobridgeError>;

    /// Status `disconnected`, `disconnected_at = now`. A `failed` instance
    /// stays `failed`.
    async fn mark_disconnected(&self, key: &InstanceKey) -> Result<(), EvobridgeError>;

    /// Status `qr_pending` with the QR payload stored.
    async fn mark_qr_pending(&self, key: &InstanceKey, qr: &str) -> Result<(), EvobridgeError>;

    /// Bumps `last_seen_at` on message activity.
    async fn touch(&self, key: &InstanceKey) -> Result<(), EvobridgeError>;

    async fn record_health_metrics(&self, snapshot: &HealthSnapshot) -> Result<(), EvobridgeError>;

    /// Round-trips the backing store.
    async fn health_check(&self) -> HealthStatus;
}
