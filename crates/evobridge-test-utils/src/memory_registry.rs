// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory instance registry for deterministic testing.
//!
//! `MemoryRegistry` mirrors the SQLite registry's semantics over a
//! `BTreeMap`, so iteration order is (tenant, slot). Flip
//! [`set_unavailable`](MemoryRegistry::set_unavailable) to make every call
//! fail like an unreachable database.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use evobridge_core::{
    EvobridgeError, HealthSnapshot, HealthStatus, Instance, InstanceKey, InstanceRegistry,
    InstanceStatus, SlotPosition, TenantId,
};

/// Builds an instance row in the given state, for seeding tests.
pub fn instance_with(
    tenant: &str,
    slot: u8,
    status: InstanceStatus,
    last_seen_at: Option<DateTime<Utc>>,
) -> Instance {
    let slot = SlotPosition::new(slot).unwrap_or_else(|_| panic!("bad slot {slot}"));
    let mut inst = Instance::provisioned(InstanceKey::new(TenantId::new(tenant), slot), Utc::now());
    inst.status = status;
    inst.last_seen_at = last_seen_at;
    inst
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    rows: Mutex<BTreeMap<InstanceKey, Instance>>,
    snapshots: Mutex<Vec<HealthSnapshot>>,
    unavailable: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry with the given rows.
    pub fn with_instances(instances: impl IntoIterator<Item = Instance>) -> Self {
        let registry = Self::new();
        for inst in instances {
            registry.insert(inst);
        }
        registry
    }

    pub fn insert(&self, instance: Instance) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(instance.key.clone(), instance);
        }
    }

    /// Synchronous read for assertions.
    pub fn get(&self, key: &InstanceKey) -> Option<Instance> {
        self.rows.lock().ok().and_then(|rows| rows.get(key).cloned())
    }

    pub fn set_last_seen(&self, key: &InstanceKey, seen: Option<DateTime<Utc>>) {
        if let Ok(mut rows) = self.rows.lock()
            && let Some(inst) = rows.get_mut(key)
        {
            inst.last_seen_at = seen;
        }
    }

    /// Makes every subsequent call fail with a storage error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every health snapshot recorded so far.
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), EvobridgeError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(EvobridgeError::Storage {
                source: "registry unavailable".into(),
            })
        } else {
            Ok(())
        }
    }

    fn with_rows<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<InstanceKey, Instance>) -> Result<T, EvobridgeError>,
    ) -> Result<T, EvobridgeError> {
        self.check_available()?;
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| EvobridgeError::Internal("registry lock poisoned".into()))?;
        f(&mut rows)
    }

    fn update(
        &self,
        key: &InstanceKey,
        f: impl FnOnce(&mut Instance, DateTime<Utc>),
    ) -> Result<(), EvobridgeError> {
        self.with_rows(|rows| {
            let inst = rows
                .get_mut(key)
                .ok_or_else(|| EvobridgeError::InstanceNotFound {
                    key: key.to_string(),
                })?;
            let now = Utc::now();
            f(inst, now);
            inst.updated_at = now;
            Ok(())
        })
    }
}

#[async_trait]
impl InstanceRegistry for MemoryRegistry {
    async fn provision_tenant(&self, tenant: &TenantId) -> Result<Vec<Instance>, EvobridgeError> {
        self.with_rows(|rows| {
            let now = Utc::now();
            for slot in SlotPosition::all() {
                let key = InstanceKey::new(tenant.clone(), slot);
                rows.entry(key.clone())
                    .or_insert_with(|| Instance::provisioned(key, now));
            }
            Ok(rows
                .values()
                .filter(|i| &i.key.tenant_id == tenant)
                .cloned()
                .collect())
        })
    }

    async fn remove_tenant(&self, tenant: &TenantId) -> Result<usize, EvobridgeError> {
        self.with_rows(|rows| {
            let before = rows.len();
            rows.retain(|k, _| &k.tenant_id != tenant);
            Ok(before - rows.len())
        })
    }

    async fn get_instance(&self, key: &InstanceKey) -> Result<Option<Instance>, EvobridgeError> {
        self.with_rows(|rows| Ok(rows.get(key).cloned()))
    }

    async fn find_by_session_name(&self, name: &str) -> Result<Option<Instance>, EvobridgeError> {
        self.with_rows(|rows| Ok(rows.values().find(|i| i.session_name == name).cloned()))
    }

    async fn list_instances(
        &self,
        tenant: Option<&TenantId>,
    ) -> Result<Vec<Instance>, EvobridgeError> {
        self.with_rows(|rows| {
            Ok(rows
                .values()
                .filter(|i| tenant.is_none_or(|t| &i.key.tenant_id == t))
                .cloned()
                .collect())
        })
    }

    async fn list_monitorable(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Instance>, EvobridgeError> {
        let since = now - window;
        self.with_rows(|rows| {
            Ok(rows
                .values()
                .filter(|i| i.status.is_active() || i.last_seen_at.is_some_and(|t| t >= since))
                .cloned()
                .collect())
        })
    }

    async fn mark_reconnecting(&self, key: &InstanceKey) -> Result<(), EvobridgeError> {
        self.update(key, |inst, now| {
            inst.status = InstanceStatus::Connecting;
            inst.last_seen_at = Some(now);
            inst.reconnect_attempts += 1;
            inst.last_reconnect_at = Some(now);
            inst.qr_payload = None;
        })
    }

    async fn mark_failed(&self, key: &InstanceKey, reason: &str) -> Result<(), EvobridgeError> {
        self.update(key, |inst, _| {
            inst.status = InstanceStatus::Failed;
            inst.failure_reason = Some(reason.to_string());
            inst.qr_payload = None;
        })
    }

    async fn mark_healthy(
        &self,
        key: &InstanceKey,
        phone_number: Option<&str>,
    ) -> Result<(), EvobridgeError> {
        self.update(key, |inst, now| {
            inst.status = InstanceStatus::Connected;
            if let Some(phone) = phone_number {
                inst.phone_number = Some(phone.to_string());
            }
            inst.connected_at = Some(now);
            inst.last_seen_at = Some(now);
            inst.reconnect_attempts = 0;
            inst.failure_reason = None;
            inst.qr_payload = None;
        })
    }

    async fn mark_disconnected(&self, key: &InstanceKey) -> Result<(), EvobridgeError> {
        self.update(key, |inst, now| {
            if inst.status != InstanceStatus::Failed {
                inst.status = InstanceStatus::Disconnected;
                inst.disconnected_at = Some(now);
            }
            inst.qr_payload = None;
        })
    }

    async fn mark_qr_pending(&self, key: &InstanceKey, qr: &str) -> Result<(), EvobridgeError> {
        self.update(key, |inst, now| {
            inst.status = InstanceStatus::QrPending;
            inst.qr_payload = Some(qr.to_string());
            inst.last_seen_at = Some(now);
        })
    }

    async fn touch(&self, key: &InstanceKey) -> Result<(), EvobridgeError> {
        self.update(key, |inst, now| inst.last_seen_at = Some(now))
    }

    async fn record_health_metrics(&self, snapshot: &HealthSnapshot) -> Result<(), EvobridgeError> {
        self.check_available()?;
        if let Ok(mut snaps) = self.snapshots.lock() {
            snaps.push(snapshot.clone());
        }
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.check_available() {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }
}
