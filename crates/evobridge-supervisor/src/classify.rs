// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health classification of a single instance.

use chrono::{DateTime, Duration, Utc};

use evobridge_core::{ConnectionReport, ConnectionState, Instance, InstanceStatus, UnhealthyReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    Unhealthy(UnhealthyReason),
}

/// Classifies an instance from its persisted row and the live gateway report.
///
/// Rules apply in order: a session unknown to the gateway is missing; any
/// state other than `open` is a disconnect; a `connected` row that has not
/// been seen for longer than `stale_after` (or never) is inactive.
pub fn classify(
    instance: &Instance,
    report: &ConnectionReport,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> Verdict {
    if report.not_found {
        return Verdict::Unhealthy(UnhealthyReason::SessionMissing);
    }
    if report.state != ConnectionState::Open {
        return Verdict::Unhealthy(UnhealthyReason::EvolutionDisconnected);
    }
    if instance.status == InstanceStatus::Connected {
        let stale = match instance.last_seen_at {
            Some(seen) => now - seen > stale_after,
            None => true,
        };
        if stale {
            return Verdict::Unhealthy(UnhealthyReason::InactiveConnection);
        }
    }
    Verdict::Healthy
}
