// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot operator commands: `check`, `provision`, `status`.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use evobridge_config::EvobridgeConfig;
use evobridge_core::types::format_timestamp;
use evobridge_core::{
    EvobridgeError, HealthSnapshot, Instance, InstanceRegistry, NullSink, SessionGateway, TenantId,
};
use evobridge_evolution::EvolutionClient;
use evobridge_storage::SqliteRegistry;
use evobridge_supervisor::{CheckSummary, Supervisor, SupervisorSettings};

/// Structured output of `evobridge status --json`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub instances: Vec<Instance>,
    pub last_snapshot: Option<HealthSnapshot>,
}

/// Run `evobridge check`: one connection-check cycle, summary as JSON.
pub async fn run_check(config: &EvobridgeConfig) -> Result<(), EvobridgeError> {
    let registry = SqliteRegistry::open(&config.storage).await?;
    let gateway = EvolutionClient::new(&config.evolution)?;

    let summary = check_once(
        Arc::new(registry.clone()),
        Arc::new(gateway),
        SupervisorSettings::from_config(config),
    )
    .await;
    registry.close().await?;

    println!("{}", to_json(&summary?)?);
    Ok(())
}

/// Run `evobridge provision <tenant>`.
pub async fn run_provision(config: &EvobridgeConfig, tenant: &str) -> Result<(), EvobridgeError> {
    let registry = SqliteRegistry::open(&config.storage).await?;
    let instances = provision(&registry, tenant).await?;
    registry.close().await?;

    for instance in &instances {
        println!("{}\t{}", instance.session_name, instance.status);
    }
    Ok(())
}

/// Run `evobridge status [--tenant] [--json]`.
pub async fn run_status(
    config: &EvobridgeConfig,
    tenant: Option<&str>,
    json: bool,
) -> Result<(), EvobridgeError> {
    let registry = SqliteRegistry::open(&config.storage).await?;
    let report = StatusReport {
        instances: registry
            .list_instances(tenant.map(TenantId::new).as_ref())
            .await?,
        last_snapshot: registry.last_health_snapshot().await?,
    };

    if json {
        println!("{}", to_json(&report)?);
    } else {
        print!("{}", render_status(&report));
    }
    Ok(())
}

/// Runs a single connection check outside of the scheduled jobs.
async fn check_once(
    registry: Arc<dyn InstanceRegistry>,
    gateway: Arc<dyn SessionGateway>,
    settings: SupervisorSettings,
) -> Result<CheckSummary, EvobridgeError> {
    let supervisor = Supervisor::new(registry, gateway, Arc::new(NullSink), settings);
    supervisor.check_connections().await
}

async fn provision(
    registry: &dyn InstanceRegistry,
    tenant: &str,
) -> Result<Vec<Instance>, EvobridgeError> {
    if !TenantId::is_valid(tenant) {
        return Err(EvobridgeError::Config(format!("invalid tenant id `{tenant}`")));
    }
    registry.provision_tenant(&TenantId::new(tenant)).await
}

fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:<13} {:<16} {:<8} LAST SEEN",
        "INSTANCE", "STATUS", "PHONE", "RETRIES"
    );
    for instance in &report.instances {
        let _ = writeln!(
            out,
            "{:<28} {:<13} {:<16} {:<8} {}",
            instance.session_name,
            instance.status.to_string(),
            instance.phone_number.as_deref().unwrap_or("-"),
            instance.reconnect_attempts,
            instance
                .last_seen_at
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    match &report.last_snapshot {
        Some(s) => {
            let _ = writeln!(
                out,
                "\nlast check {}: {}/{} healthy ({}%)",
                format_timestamp(&s.checked_at),
                s.healthy,
                s.total,
                s.health_rate
            );
        }
        None => out.push_str("\nno health check recorded yet\n"),
    }
    out
}

fn to_json<T: Serialize>(value: &T) -> Result<String, EvobridgeError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| EvobridgeError::Internal(format!("failed to serialize output: {e}")))
}
