// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key/value fleet health metrics.

use chrono::Utc;
use evobridge_core::{EvobridgeError, HealthSnapshot};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, from_sql_ts, map_tr_err, to_sql_ts};

pub const HEALTHY_INSTANCES: &str = "healthy_instances";
pub const TOTAL_INSTANCES: &str = "total_instances";
pub const HEALTH_RATE: &str = "health_rate";
pub const LAST_HEALTH_CHECK: &str = "last_health_check";

/// Upserts the four health metrics in one transaction.
pub async fn record_health(db: &Database, snapshot: &HealthSnapshot) -> Result<(), EvobridgeError> {
    let checked_at = to_sql_ts(&snapshot.checked_at);
    let values = [
        (HEALTHY_INSTANCES, snapshot.healthy.to_string()),
        (TOTAL_INSTANCES, snapshot.total.to_string()),
        (HEALTH_RATE, snapshot.health_rate.to_string()),
        (LAST_HEALTH_CHECK, checked_at.clone()),
    ];
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for (name, value) in &values {
                tx.execute(
                    "INSERT INTO system_metrics (metric_name, metric_value, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (metric_name) DO UPDATE
                        SET metric_value = excluded.metric_value,
                            updated_at = excluded.updated_at",
                    params![name, value, checked_at],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_metric(db: &Database, name: &str) -> Result<Option<String>, EvobridgeError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT metric_value FROM system_metrics WHERE metric_name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Reassembles the last persisted snapshot, if a full set exists.
pub async fn last_snapshot(db: &Database) -> Result<Option<HealthSnapshot>, EvobridgeError> {
    let healthy = get_metric(db, HEALTHY_INSTANCES).await?;
    let total = get_metric(db, TOTAL_INSTANCES).await?;
    let checked = get_metric(db, LAST_HEALTH_CHECK).await?;
    let (Some(healthy), Some(total), Some(checked)) = (healthy, total, checked) else {
        return Ok(None);
    };
    let parse_err = |what: &str| EvobridgeError::Storage {
        source: format!("malformed {what} metric").into(),
    };
    let healthy = healthy.parse().map_err(|_| parse_err(HEALTHY_INSTANCES))?;
    let total = total.parse().map_err(|_| parse_err(TOTAL_INSTANCES))?;
    let checked_at = from_sql_ts(&checked).unwrap_or_else(|_| Utc::now());
    Ok(Some(HealthSnapshot::new(healthy, total, checked_at)))
}
