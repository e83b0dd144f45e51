// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timing and retry parameters of the supervisor.

use std::time::Duration;

use evobridge_config::model::EvobridgeConfig;

/// Resolved supervisor parameters.
///
/// Built from the loaded configuration with [`SupervisorSettings::from_config`];
/// the `Default` impl carries the production constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub check_interval: Duration,
    pub health_interval: Duration,
    pub reset_interval: Duration,
    /// A connected instance silent for longer than this is unhealthy.
    pub stale_after: Duration,
    /// Non-active instances seen within this window are still monitored.
    pub monitor_window: Duration,
    pub max_retries: u32,
    pub restart_settle: Duration,
    pub recreate_settle: Duration,
    pub state_timeout: Duration,
    pub remediation_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(120),
            health_interval: Duration::from_secs(900),
            reset_interval: Duration::from_secs(3600),
            stale_after: Duration::from_secs(1800),
            monitor_window: Duration::from_secs(3600),
            max_retries: 3,
            restart_settle: Duration::from_secs(5),
            recreate_settle: Duration::from_secs(2),
            state_timeout: Duration::from_secs(5),
            remediation_timeout: Duration::from_secs(30),
        }
    }
}

impl SupervisorSettings {
    pub fn from_config(config: &EvobridgeConfig) -> Self {
        let sup = &config.supervisor;
        Self {
            check_interval: Duration::from_secs(sup.check_interval_secs),
            health_interval: Duration::from_secs(sup.health_interval_secs),
            reset_interval: Duration::from_secs(sup.reset_interval_secs),
            stale_after: Duration::from_secs(sup.stale_after_secs),
            monitor_window: Duration::from_secs(sup.monitor_window_secs),
            max_retries: sup.max_retries,
            restart_settle: Duration::from_secs(sup.restart_settle_secs),
            recreate_settle: Duration::from_secs(sup.recreate_settle_secs),
            state_timeout: config.evolution.state_timeout(),
            remediation_timeout: Duration::from_secs(sup.remediation_timeout_secs),
        }
    }
}

/// Converts a wall-clock span for comparisons against stored timestamps.
pub(crate) fn chrono_span(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_constants() {
        let settings = SupervisorSettings::from_config(&EvobridgeConfig::default());
        assert_eq!(settings, SupervisorSettings::default());
    }

    #[test]
    fn overrides_flow_through() {
        let mut config = EvobridgeConfig::default();
        config.supervisor.max_retries = 5;
        config.supervisor.stale_after_secs = 60;
        config.evolution.state_timeout_secs = 2;
        let settings = SupervisorSettings::from_config(&config);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.stale_after, Duration::from_secs(60));
        assert_eq!(settings.state_timeout, Duration::from_secs(2));
    }

    #[test]
    fn chrono_span_saturates() {
        assert_eq!(chrono_span(Duration::from_secs(90)), chrono::Duration::seconds(90));
        assert_eq!(chrono_span(Duration::MAX), chrono::Duration::MAX);
    }
}
