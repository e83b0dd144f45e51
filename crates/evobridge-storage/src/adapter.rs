// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the InstanceRegistry trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use evobridge_config::model::StorageConfig;
use evobridge_core::{
    EvobridgeError, HealthSnapshot, HealthStatus, Instance, InstanceKey, InstanceRegistry,
    TenantId,
};

use crate::database::{Database, map_tr_err};
use crate::queries::{instances, metrics};

/// SQLite-backed instance registry.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
#[derive(Clone)]
pub struct SqliteRegistry {
    db: Database,
}

impl SqliteRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens the database named by the storage config.
    pub async fn open(config: &StorageConfig) -> Result<Self, EvobridgeError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite registry initialized");
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The most recently persisted health snapshot.
    pub async fn last_health_snapshot(&self) -> Result<Option<HealthSnapshot>, EvobridgeError> {
        metrics::last_snapshot(&self.db).await
    }

    /// Flushes the WAL before shutdown.
    pub async fn close(&self) -> Result<(), EvobridgeError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl InstanceRegistry for SqliteRegistry {
    async fn provision_tenant(&self, tenant: &TenantId) -> Result<Vec<Instance>, EvobridgeError> {
        let created = instances::provision_tenant(&self.db, tenant, Utc::now()).await?;
        debug!(tenant = %tenant, created, "tenant provisioned");
        instances::list_instances(&self.db, Some(tenant)).await
    }

    async fn remove_tenant(&self, tenant: &TenantId) -> Result<usize, EvobridgeError> {
        let removed = instances::remove_tenant(&self.db, tenant).await?;
        if removed == 0 {
            warn!(tenant = %tenant, "remove_tenant: tenant had no instances");
        }
        Ok(removed)
    }

    async fn get_instance(&self, key: &InstanceKey) -> Result<Option<Instance>, EvobridgeError> {
        instances::get_instance(&self.db, key).await
    }

    async fn find_by_session_name(&self, name: &str) -> Result<Option<Instance>, EvobridgeError> {
        instances::find_by_session_name(&self.db, name).await
    }

    async fn list_instances(
        &self,
        tenant: Option<&TenantId>,
    ) -> Result<Vec<Instance>, EvobridgeError> {
        instances::list_instances(&self.db, tenant).await
    }

    async fn list_monitorable(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Instance>, EvobridgeError> {
        instances::list_monitorable(&self.db, now - window).await
    }

    async fn mark_reconnecting(&self, key: &InstanceKey) -> Result<(), EvobridgeError> {
        instances::mark_reconnecting(&self.db, key, Utc::now()).await
    }

    async fn mark_failed(&self, key: &InstanceKey, reason: &str) -> Result<(), EvobridgeError> {
        instances::mark_failed(&self.db, key, reason, Utc::now()).await
    }

    async fn mark_healthy(
        &self,
        key: &InstanceKey,
        phone_number: Option<&str>,
    ) -> Result<(), EvobridgeError> {
        instances::mark_healthy(&self.db, key, phone_number, Utc::now()).await
    }

    async fn mark_disconnected(&self, key: &InstanceKey) -> Result<(), EvobridgeError> {
        instances::mark_disconnected(&self.db, key, Utc::now()).await
    }

    async fn mark_qr_pending(&self, key: &InstanceKey, qr: &str) -> Result<(), EvobridgeError> {
        instances::mark_qr_pending(&self.db, key, qr, Utc::now()).await
    }

    async fn touch(&self, key: &InstanceKey) -> Result<(), EvobridgeError> {
        instances::set_last_seen(&self.db, key, Utc::now()).await
    }

    async fn record_health_metrics(&self, snapshot: &HealthSnapshot) -> Result<(), EvobridgeError> {
        metrics::record_health(&self.db, snapshot).await
    }

    async fn health_check(&self) -> HealthStatus {
        let probe = self
            .db
            .connection()
            .call(|conn| conn.execute_batch("SELECT 1;"))
            .await
            .map_err(map_tr_err);
        match probe {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }
}
