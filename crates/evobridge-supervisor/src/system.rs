// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-level health figures.

use std::time::Duration;

use sysinfo::{ProcessesToUpdate, System};

use evobridge_core::{HealthStatus, SystemHealth};

/// Uptime plus resident memory of the current process.
pub fn system_health(uptime: Duration) -> SystemHealth {
    let memory_bytes = process_memory();
    let status = match memory_bytes {
        Some(_) => HealthStatus::Healthy,
        None => HealthStatus::Degraded("process memory unavailable".to_string()),
    };
    SystemHealth {
        uptime_secs: uptime.as_secs(),
        memory_bytes,
        status,
    }
}

fn process_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|process| process.memory())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_uptime_seconds() {
        let health = system_health(Duration::from_millis(61_500));
        assert_eq!(health.uptime_secs, 61);
        if let Some(bytes) = health.memory_bytes {
            assert!(bytes > 0);
            assert!(health.status.is_healthy());
        }
    }
}
