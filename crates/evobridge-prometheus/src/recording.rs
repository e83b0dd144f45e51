// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.

use evobridge_core::HealthSnapshot;
use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Evobridge metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_gauge!("evobridge_instances_healthy", "Healthy instances at the last check");
    describe_gauge!("evobridge_instances_total", "Monitored instances at the last check");
    describe_gauge!(
        "evobridge_health_rate_percent",
        "Share of healthy monitored instances"
    );
    describe_gauge!(
        "evobridge_active_retries",
        "Instances with a non-zero reconnection counter"
    );
    describe_counter!(
        "evobridge_reconnection_attempts_total",
        "Remediation attempts by unhealthy reason"
    );
    describe_counter!(
        "evobridge_reconnection_success_total",
        "Successful remediations"
    );
    describe_counter!(
        "evobridge_instances_failed_total",
        "Instances marked failed after exhausting retries"
    );
    describe_counter!(
        "evobridge_check_errors_total",
        "Connection checks aborted by a registry error"
    );
    describe_histogram!(
        "evobridge_check_cycle_seconds",
        "Duration of a connection-check cycle"
    );
}

pub fn record_health_snapshot(snapshot: &HealthSnapshot) {
    metrics::gauge!("evobridge_instances_healthy").set(snapshot.healthy as f64);
    metrics::gauge!("evobridge_instances_total").set(snapshot.total as f64);
    metrics::gauge!("evobridge_health_rate_percent").set(f64::from(snapshot.health_rate));
}

pub fn record_reconnection_attempt(reason: &str) {
    metrics::counter!("evobridge_reconnection_attempts_total", "reason" => reason.to_string())
        .increment(1);
}

pub fn record_reconnection_success() {
    metrics::counter!("evobridge_reconnection_success_total").increment(1);
}

pub fn record_instance_failed() {
    metrics::counter!("evobridge_instances_failed_total").increment(1);
}

pub fn record_check_error() {
    metrics::counter!("evobridge_check_errors_total").increment(1);
}

pub fn record_check_cycle(seconds: f64) {
    metrics::histogram!("evobridge_check_cycle_seconds").record(seconds);
}

pub fn set_active_retries(count: usize) {
    metrics::gauge!("evobridge_active_retries").set(count as f64);
}
