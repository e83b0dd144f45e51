// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Evobridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Evobridge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvobridgeConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Evolution API gateway connection.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Instance registry database.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reconnection supervisor timing and retry policy.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// HTTP/WebSocket surface.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name reported in logs and the health endpoint.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "evobridge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Evolution API connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvolutionConfig {
    /// Base URL of the Evolution API, e.g. `http://localhost:8080`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Value of the `apikey` header. `None` requires `EVOBRIDGE_EVOLUTION_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Webhook URL registered on newly created sessions.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Timeout for connection-state queries.
    #[serde(default = "default_state_timeout_secs")]
    pub state_timeout_secs: u64,

    /// Timeout for every other request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Path probed by the gateway health check.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            webhook_url: None,
            state_timeout_secs: default_state_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            health_path: default_health_path(),
        }
    }
}

impl EvolutionConfig {
    pub fn state_timeout(&self) -> Duration {
        Duration::from_secs(self.state_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_state_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("evobridge").join("evobridge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("evobridge.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Reconnection supervisor configuration.
///
/// All durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Run the supervisor inside `serve`.
    #[serde(default = "default_supervisor_enabled")]
    pub enabled: bool,

    /// Period of the connection-check job.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Period of the full health-check job.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    /// Period of the retry-counter reset job.
    #[serde(default = "default_reset_interval_secs")]
    pub reset_interval_secs: u64,

    /// A connected instance silent for longer than this is unhealthy.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Non-active instances seen within this window are still monitored.
    #[serde(default = "default_monitor_window_secs")]
    pub monitor_window_secs: u64,

    /// Remediation attempts per instance before it is marked failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait after a restart before re-reading the connection state.
    #[serde(default = "default_restart_settle_secs")]
    pub restart_settle_secs: u64,

    /// Wait between delete and create when recreating a session.
    #[serde(default = "default_recreate_settle_secs")]
    pub recreate_settle_secs: u64,

    /// Upper bound on every remediation call.
    #[serde(default = "default_remediation_timeout_secs")]
    pub remediation_timeout_secs: u64,

    /// Capacity of the bounded event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            enabled: default_supervisor_enabled(),
            check_interval_secs: default_check_interval_secs(),
            health_interval_secs: default_health_interval_secs(),
            reset_interval_secs: default_reset_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            monitor_window_secs: default_monitor_window_secs(),
            max_retries: default_max_retries(),
            restart_settle_secs: default_restart_settle_secs(),
            recreate_settle_secs: default_recreate_settle_secs(),
            remediation_timeout_secs: default_remediation_timeout_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_supervisor_enabled() -> bool {
    true
}

fn default_check_interval_secs() -> u64 {
    120
}

fn default_health_interval_secs() -> u64 {
    900
}

fn default_reset_interval_secs() -> u64 {
    3600
}

fn default_stale_after_secs() -> u64 {
    1800
}

fn default_monitor_window_secs() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_restart_settle_secs() -> u64 {
    5
}

fn default_recreate_settle_secs() -> u64 {
    2
}

fn default_remediation_timeout_secs() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    256
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP surface inside `serve`.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Address to bind the server to.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for the `/v1` routes. Required when enabled.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
