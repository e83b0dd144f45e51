// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for Evobridge.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text via [`PrometheusExporter::render`], which the
//! gateway serves on `/metrics`. Recording helpers are no-ops until a
//! recorder is installed.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use evobridge_core::EvobridgeError;

pub use recording::{
    record_check_cycle, record_check_error, record_health_snapshot, record_instance_failed,
    record_reconnection_attempt, record_reconnection_success, set_active_retries,
};

/// Installed Prometheus recorder plus the handle used to render it.
#[derive(Clone)]
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn install() -> Result<Self, EvobridgeError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            EvobridgeError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wraps an existing handle (used with locally scoped recorders).
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
