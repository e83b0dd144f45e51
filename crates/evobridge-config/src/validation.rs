// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero intervals, parseable URLs and bind addresses.

use crate::diagnostic::ConfigError;
use crate::model::EvobridgeConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &EvobridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let api_url = config.evolution.api_url.trim();
    if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
        fail(format!(
            "evolution.api_url `{api_url}` must start with http:// or https://"
        ));
    }
    if !config.evolution.health_path.starts_with('/') {
        fail(format!(
            "evolution.health_path `{}` must start with `/`",
            config.evolution.health_path
        ));
    }
    if config.evolution.state_timeout_secs == 0 {
        fail("evolution.state_timeout_secs must be greater than 0".to_string());
    }
    if config.evolution.request_timeout_secs == 0 {
        fail("evolution.request_timeout_secs must be greater than 0".to_string());
    }

    let sup = &config.supervisor;
    for (name, value) in [
        ("check_interval_secs", sup.check_interval_secs),
        ("health_interval_secs", sup.health_interval_secs),
        ("reset_interval_secs", sup.reset_interval_secs),
        ("stale_after_secs", sup.stale_after_secs),
        ("monitor_window_secs", sup.monitor_window_secs),
        ("remediation_timeout_secs", sup.remediation_timeout_secs),
    ] {
        if value == 0 {
            fail(format!("supervisor.{name} must be greater than 0"));
        }
    }
    if sup.max_retries == 0 {
        fail("supervisor.max_retries must be at least 1".to_string());
    }
    if sup.event_buffer == 0 {
        fail("supervisor.event_buffer must be at least 1".to_string());
    }

    if config.gateway.enabled {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
        if config
            .gateway
            .bearer_token
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            fail("gateway.bearer_token must not be empty when set".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
