// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance row CRUD and status transitions.

use chrono::{DateTime, Utc};
use evobridge_core::{
    EvobridgeError, Instance, InstanceKey, InstanceStatus, SlotPosition, TenantId,
};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, from_sql_ts, map_tr_err, to_sql_ts};

const COLUMNS: &str = "tenant_id, slot, session_name, status, phone_number, qr_payload,
    last_seen_at, connected_at, disconnected_at, reconnect_attempts, last_reconnect_at,
    failure_reason, created_at, updated_at";

fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| from_sql_ts(&raw).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn required_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    from_sql_ts(&raw).map_err(|e| conversion_err(idx, e))
}

fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<Instance> {
    let slot = SlotPosition::new(row.get(1)?).map_err(|e| conversion_err(1, e))?;
    let status: String = row.get(3)?;
    let status = status
        .parse::<InstanceStatus>()
        .map_err(|e| conversion_err(3, e))?;
    Ok(Instance {
        key: InstanceKey::new(TenantId(row.get(0)?), slot),
        session_name: row.get(2)?,
        status,
        phone_number: row.get(4)?,
        qr_payload: row.get(5)?,
        last_seen_at: ts_column(row, 6)?,
        connected_at: ts_column(row, 7)?,
        disconnected_at: ts_column(row, 8)?,
        reconnect_attempts: row.get(9)?,
        last_reconnect_at: ts_column(row, 10)?,
        failure_reason: row.get(11)?,
        created_at: required_ts(row, 12)?,
        updated_at: required_ts(row, 13)?,
    })
}

fn not_found(key: &InstanceKey) -> EvobridgeError {
    EvobridgeError::InstanceNotFound {
        key: key.to_string(),
    }
}

/// Inserts an `inactive` row for every slot of the tenant that does not
/// already have one. Returns how many rows were created.
pub async fn provision_tenant(
    db: &Database,
    tenant: &TenantId,
    now: DateTime<Utc>,
) -> Result<usize, EvobridgeError> {
    let tenant = tenant.clone();
    let now = to_sql_ts(&now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut created = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO whatsapp_instances
                        (tenant_id, slot, session_name, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 'inactive', ?4, ?4)",
                )?;
                for slot in SlotPosition::all() {
                    let key = InstanceKey::new(tenant.clone(), slot);
                    created += stmt.execute(params![
                        tenant.as_str(),
                        slot.get(),
                        key.session_name(),
                        now
                    ])?;
                }
            }
            tx.commit()?;
            Ok(created)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes every instance row of the tenant.
pub async fn remove_tenant(db: &Database, tenant: &TenantId) -> Result<usize, EvobridgeError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM whatsapp_instances WHERE tenant_id = ?1",
                params![tenant],
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_instance(
    db: &Database,
    key: &InstanceKey,
) -> Result<Option<Instance>, EvobridgeError> {
    let tenant = key.tenant_id.0.clone();
    let slot = key.slot.get();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM whatsapp_instances WHERE tenant_id = ?1 AND slot = ?2"
                ),
                params![tenant, slot],
                instance_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_session_name(
    db: &Database,
    name: &str,
) -> Result<Option<Instance>, EvobridgeError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM whatsapp_instances WHERE session_name = ?1"),
                params![name],
                instance_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Lists instances ordered by (tenant, slot), optionally for one tenant.
pub async fn list_instances(
    db: &Database,
    tenant: Option<&TenantId>,
) -> Result<Vec<Instance>, EvobridgeError> {
    let tenant = tenant.map(|t| t.0.clone());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM whatsapp_instances
                 WHERE ?1 IS NULL OR tenant_id = ?1
                 ORDER BY tenant_id, slot"
            ))?;
            let rows = stmt.query_map(params![tenant], instance_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Active instances (`connected`, `connecting`, legacy `open`) plus any
/// instance seen at or after `seen_since`.
pub async fn list_monitorable(
    db: &Database,
    seen_since: DateTime<Utc>,
) -> Result<Vec<Instance>, EvobridgeError> {
    let seen_since = to_sql_ts(&seen_since);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM whatsapp_instances
                 WHERE status IN ('connected', 'connecting', 'open')
                    OR (last_seen_at IS NOT NULL AND last_seen_at >= ?1)
                 ORDER BY tenant_id, slot"
            ))?;
            let rows = stmt.query_map(params![seen_since], instance_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Runs an `UPDATE ... WHERE tenant_id = ?1 AND slot = ?2` with `now` bound
/// to `?3` and, when the clause references it, `extra` bound to `?4`.
/// Fails with `InstanceNotFound` if no row matched.
async fn update_instance(
    db: &Database,
    key: &InstanceKey,
    set_clause: &'static str,
    now: DateTime<Utc>,
    extra: Option<String>,
) -> Result<(), EvobridgeError> {
    let tenant = key.tenant_id.0.clone();
    let slot = key.slot.get();
    let now = to_sql_ts(&now);
    let changed = db
        .connection()
        .call(move |conn| {
            let sql = format!(
                "UPDATE whatsapp_instances SET {set_clause}, updated_at = ?3
                 WHERE tenant_id = ?1 AND slot = ?2"
            );
            if set_clause.contains("?4") {
                conn.execute(&sql, params![tenant, slot, now, extra])
            } else {
                conn.execute(&sql, params![tenant, slot, now])
            }
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(not_found(key));
    }
    Ok(())
}

pub async fn mark_reconnecting(
    db: &Database,
    key: &InstanceKey,
    now: DateTime<Utc>,
) -> Result<(), EvobridgeError> {
    update_instance(
        db,
        key,
        "status = 'connecting', last_seen_at = ?3, qr_payload = NULL,
         reconnect_attempts = reconnect_attempts + 1, last_reconnect_at = ?3",
        now,
        None,
    )
    .await
}

pub async fn mark_failed(
    db: &Database,
    key: &InstanceKey,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(), EvobridgeError> {
    update_instance(
        db,
        key,
        "status = 'failed', failure_reason = ?4, qr_payload = NULL",
        now,
        Some(reason.to_string()),
    )
    .await
}

/// Keeps the stored phone number when the callback did not carry one.
pub async fn mark_healthy(
    db: &Database,
    key: &InstanceKey,
    phone_number: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), EvobridgeError> {
    update_instance(
        db,
        key,
        "status = 'connected', phone_number = COALESCE(?4, phone_number),
         connected_at = ?3, last_seen_at = ?3, reconnect_attempts = 0,
         failure_reason = NULL, qr_payload = NULL",
        now,
        phone_number.map(str::to_string),
    )
    .await
}

/// A `failed` row keeps its status; only `mark_healthy` clears it.
pub async fn mark_disconnected(
    db: &Database,
    key: &InstanceKey,
    now: DateTime<Utc>,
) -> Result<(), EvobridgeError> {
    update_instance(
        db,
        key,
        "status = CASE status WHEN 'failed' THEN 'failed' ELSE 'disconnected' END,
         disconnected_at = CASE status WHEN 'failed' THEN disconnected_at ELSE ?3 END,
         qr_payload = NULL",
        now,
        None,
    )
    .await
}

pub async fn mark_qr_pending(
    db: &Database,
    key: &InstanceKey,
    qr: &str,
    now: DateTime<Utc>,
) -> Result<(), EvobridgeError> {
    update_instance(
        db,
        key,
        "status = 'qr_pending', qr_payload = ?4, last_seen_at = ?3",
        now,
        Some(qr.to_string()),
    )
    .await
}

/// Sets `last_seen_at` to `seen_at`.
pub async fn set_last_seen(
    db: &Database,
    key: &InstanceKey,
    seen_at: DateTime<Utc>,
) -> Result<(), EvobridgeError> {
    update_instance(db, key, "last_seen_at = ?3", seen_at, None).await
}
