// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection-check, retry-budget and scheduling behaviour of the supervisor,
//! driven against the in-memory registry and the scripted gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use evobridge_core::{
    ConnectionState, HealthStatus, InstanceKey, InstanceRegistry, InstanceStatus,
    MAX_ATTEMPTS_EXCEEDED, SlotPosition, SupervisorEvent, TenantId,
};
use evobridge_supervisor::{Supervisor, SupervisorSettings};
use evobridge_test_utils::{
    GatewayCall, MemoryRegistry, MockGateway, ReconnectOutcome, RecordingSink, instance_with,
};

struct Harness {
    registry: Arc<MemoryRegistry>,
    gateway: Arc<MockGateway>,
    sink: Arc<RecordingSink>,
    supervisor: Supervisor,
}

fn harness(registry: MemoryRegistry) -> Harness {
    let registry = Arc::new(registry);
    let gateway = Arc::new(MockGateway::new());
    let sink = Arc::new(RecordingSink::new());
    let supervisor = Supervisor::new(
        registry.clone(),
        gateway.clone(),
        sink.clone(),
        SupervisorSettings::default(),
    );
    Harness {
        registry,
        gateway,
        sink,
        supervisor,
    }
}

fn key(tenant: &str, slot: u8) -> InstanceKey {
    InstanceKey::new(TenantId::new(tenant), SlotPosition::new(slot).unwrap())
}

fn attempts(sink: &RecordingSink) -> Vec<u32> {
    sink.events()
        .into_iter()
        .filter_map(|e| match e {
            SupervisorEvent::ReconnectionAttempt { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect()
}

fn connected_now(tenant: &str, slot: u8) -> MemoryRegistry {
    MemoryRegistry::with_instances([instance_with(
        tenant,
        slot,
        InstanceStatus::Connected,
        Some(Utc::now()),
    )])
}

#[tokio::test(start_paused = true)]
async fn closed_session_fails_after_three_cycles() {
    let h = harness(connected_now("T1", 3));
    h.gateway.set_state("T1_wa_3", ConnectionState::Close);
    h.gateway.set_reconnect("T1_wa_3", ReconnectOutcome::NoQr);

    for _ in 0..3 {
        h.supervisor.check_connections().await.unwrap();
    }

    assert_eq!(attempts(&h.sink), vec![1, 2, 3]);
    assert_eq!(h.sink.count("instance-failed"), 1);
    assert_eq!(
        h.sink.kinds(),
        vec![
            "reconnection-attempt",
            "reconnection-attempt",
            "reconnection-attempt",
            "instance-failed"
        ]
    );

    let row = h.registry.get(&key("T1", 3)).unwrap();
    assert_eq!(row.status, InstanceStatus::Failed);
    assert_eq!(row.failure_reason.as_deref(), Some(MAX_ATTEMPTS_EXCEEDED));

    match h.sink.events().last() {
        Some(SupervisorEvent::InstanceFailed {
            instance,
            tenant_id,
            reason,
        }) => {
            assert_eq!(instance, "T1_wa_3");
            assert_eq!(tenant_id.as_str(), "T1");
            assert_eq!(reason, MAX_ATTEMPTS_EXCEEDED);
        }
        other => panic!("expected instance-failed, got {other:?}"),
    }

    // A failed instance is skipped: no fourth attempt, no further events.
    h.gateway.clear_calls();
    let summary = h.supervisor.check_connections().await.unwrap();
    assert!(h.gateway.calls().is_empty());
    assert_eq!(h.sink.count("reconnection-attempt"), 3);
    assert_eq!(h.sink.count("instance-failed"), 1);
    assert_eq!(summary.skipped_failed, 1);
    assert_eq!(summary.snapshot.total, 1);
    assert_eq!(summary.snapshot.healthy, 0);
}

#[tokio::test(start_paused = true)]
async fn close_callback_does_not_revive_failed_instance() {
    let h = harness(connected_now("T1", 3));
    h.gateway.set_state("T1_wa_3", ConnectionState::Close);
    h.gateway.set_reconnect("T1_wa_3", ReconnectOutcome::NoQr);
    for _ in 0..3 {
        h.supervisor.check_connections().await.unwrap();
    }
    assert_eq!(
        h.registry.get(&key("T1", 3)).unwrap().status,
        InstanceStatus::Failed
    );

    // Evolution keeps reporting the session closed.
    h.registry.mark_disconnected(&key("T1", 3)).await.unwrap();
    h.supervisor.check_connections().await.unwrap();
    h.supervisor.reset_retry_counters().await;
    h.registry.mark_disconnected(&key("T1", 3)).await.unwrap();
    h.gateway.clear_calls();
    let summary = h.supervisor.check_connections().await.unwrap();

    assert_eq!(
        h.registry.get(&key("T1", 3)).unwrap().status,
        InstanceStatus::Failed
    );
    assert_eq!(h.sink.count("instance-failed"), 1);
    assert_eq!(h.sink.count("reconnection-attempt"), 3);
    assert!(h.gateway.calls().is_empty());
    assert_eq!(summary.skipped_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn attempt_events_carry_budget() {
    let h = harness(connected_now("T1", 1));
    h.gateway.set_state("T1_wa_1", ConnectionState::Close);
    h.gateway.set_reconnect("T1_wa_1", ReconnectOutcome::Fail);

    h.supervisor.check_connections().await.unwrap();

    assert_eq!(
        h.sink.events(),
        vec![SupervisorEvent::ReconnectionAttempt {
            instance: "T1_wa_1".into(),
            attempt: 1,
            max_retries: 3,
        }]
    );
    // A failed remediation leaves the persisted row alone.
    let row = h.registry.get(&key("T1", 1)).unwrap();
    assert_eq!(row.status, InstanceStatus::Connected);
    assert_eq!(row.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_blocks_gateway_until_reset() {
    let h = harness(connected_now("T1", 1));
    let k = key("T1", 1);
    h.gateway.set_state("T1_wa_1", ConnectionState::Close);
    h.gateway.set_reconnect("T1_wa_1", ReconnectOutcome::NoQr);

    for _ in 0..3 {
        h.supervisor.check_connections().await.unwrap();
    }
    assert_eq!(h.registry.get(&k).unwrap().status, InstanceStatus::Failed);

    // The callback path revives the row, but the gateway is still closed.
    h.registry.mark_healthy(&k, None).await.unwrap();
    h.gateway.clear_calls();
    h.sink.clear();

    h.supervisor.check_connections().await.unwrap();
    assert!(h.gateway.remediation_calls().is_empty());
    assert_eq!(h.sink.kinds(), vec!["instance-failed"]);
    assert_eq!(h.registry.get(&k).unwrap().status, InstanceStatus::Failed);

    // After the sweep, remediation starts over from attempt 1.
    assert_eq!(h.supervisor.reset_retry_counters().await, 1);
    h.registry.mark_healthy(&k, None).await.unwrap();
    h.sink.clear();

    h.supervisor.check_connections().await.unwrap();
    assert_eq!(
        h.gateway.remediation_calls(),
        vec![GatewayCall::RequestReconnect("T1_wa_1".into())]
    );
    assert_eq!(attempts(&h.sink), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn success_resets_the_counter() {
    let h = harness(connected_now("T2", 2));
    let k = key("T2", 2);
    h.gateway.set_state("T2_wa_2", ConnectionState::Close);
    h.gateway.set_reconnect("T2_wa_2", ReconnectOutcome::NoQr);

    h.supervisor.check_connections().await.unwrap();
    assert_eq!(h.supervisor.stats().active_retries, 1);

    h.gateway.set_reconnect("T2_wa_2", ReconnectOutcome::Qr);
    let summary = h.supervisor.check_connections().await.unwrap();
    assert_eq!(summary.recovered, 1);
    assert_eq!(h.supervisor.stats().active_retries, 0);

    let row = h.registry.get(&k).unwrap();
    assert_eq!(row.status, InstanceStatus::Connecting);
    assert_eq!(row.reconnect_attempts, 1);
    assert!(row.last_reconnect_at.is_some());

    match h.sink.events().last() {
        Some(SupervisorEvent::ReconnectionSuccess {
            instance,
            tenant_id,
        }) => {
            assert_eq!(instance, "T2_wa_2");
            assert_eq!(tenant_id.as_str(), "T2");
        }
        other => panic!("expected reconnection-success, got {other:?}"),
    }

    // Still closed: the next failure counts from 1 again.
    h.gateway.set_reconnect("T2_wa_2", ReconnectOutcome::NoQr);
    h.sink.clear();
    h.supervisor.check_connections().await.unwrap();
    assert_eq!(attempts(&h.sink), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn stale_connection_is_restarted() {
    let h = harness(MemoryRegistry::with_instances([
        instance_with(
            "T1",
            1,
            InstanceStatus::Connected,
            Some(Utc::now() - chrono::Duration::minutes(45)),
        ),
        instance_with(
            "T1",
            2,
            InstanceStatus::Connected,
            Some(Utc::now() - chrono::Duration::minutes(10)),
        ),
    ]));
    h.gateway.set_state_after_restart("T1_wa_1", ConnectionState::Open);

    let summary = h.supervisor.check_connections().await.unwrap();

    assert_eq!(summary.snapshot.total, 2);
    assert_eq!(summary.snapshot.healthy, 1);
    assert_eq!(summary.snapshot.health_rate, 50);
    assert_eq!(summary.recovered, 1);
    assert_eq!(
        h.gateway.remediation_calls(),
        vec![GatewayCall::Restart("T1_wa_1".into())]
    );
    assert_eq!(
        h.sink.kinds(),
        vec!["reconnection-attempt", "reconnection-success"]
    );
    assert_eq!(
        h.registry.get(&key("T1", 2)).unwrap().status,
        InstanceStatus::Connected
    );
}

#[tokio::test(start_paused = true)]
async fn restart_that_stays_closed_is_a_failure() {
    let h = harness(MemoryRegistry::with_instances([instance_with(
        "T1",
        1,
        InstanceStatus::Connected,
        None,
    )]));
    h.gateway.set_state_after_restart("T1_wa_1", ConnectionState::Close);

    let summary = h.supervisor.check_connections().await.unwrap();
    assert_eq!(summary.recovered, 0);
    assert_eq!(h.sink.kinds(), vec!["reconnection-attempt"]);
}

#[tokio::test(start_paused = true)]
async fn missing_session_is_recreated() {
    let h = harness(connected_now("T3", 4));
    h.gateway.set_missing("T3_wa_4");

    let summary = h.supervisor.check_connections().await.unwrap();

    assert_eq!(summary.recovered, 1);
    assert_eq!(
        h.gateway.remediation_calls(),
        vec![
            GatewayCall::Delete("T3_wa_4".into()),
            GatewayCall::Create("T3_wa_4".into()),
            GatewayCall::RequestReconnect("T3_wa_4".into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn recreate_sequence_is_not_bounded_as_a_whole() {
    let h = harness(connected_now("T3", 2));
    h.gateway.set_missing("T3_wa_2");
    // Each call fits the 30 s bound, the whole sequence does not.
    h.gateway.set_remediation_delay(Duration::from_secs(20));

    let summary = h.supervisor.check_connections().await.unwrap();

    assert_eq!(summary.recovered, 1);
    assert_eq!(h.sink.count("reconnection-success"), 1);
    assert_eq!(
        h.registry.get(&key("T3", 2)).unwrap().status,
        InstanceStatus::Connecting
    );
}

#[tokio::test(start_paused = true)]
async fn slow_remediation_call_times_out() {
    let h = harness(connected_now("T1", 2));
    h.gateway.set_state("T1_wa_2", ConnectionState::Close);
    h.gateway.set_remediation_delay(Duration::from_secs(45));

    let summary = h.supervisor.check_connections().await.unwrap();

    assert_eq!(summary.recovered, 0);
    assert_eq!(attempts(&h.sink), vec![1]);
    assert_eq!(h.sink.count("reconnection-success"), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_create_counts_as_failed_attempt() {
    let h = harness(connected_now("T3", 1));
    h.gateway.set_missing("T3_wa_1");
    h.gateway.fail_create("T3_wa_1");

    h.supervisor.check_connections().await.unwrap();

    assert_eq!(attempts(&h.sink), vec![1]);
    assert_eq!(h.sink.count("reconnection-success"), 0);
    assert!(
        !h.gateway
            .remediation_calls()
            .contains(&GatewayCall::RequestReconnect("T3_wa_1".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn slow_state_query_is_treated_as_disconnected() {
    let h = harness(connected_now("T1", 1));
    h.gateway.set_state_delay(Duration::from_secs(10));

    let summary = h.supervisor.check_connections().await.unwrap();

    assert_eq!(summary.unhealthy, 1);
    assert_eq!(
        h.gateway.remediation_calls(),
        vec![GatewayCall::RequestReconnect("T1_wa_1".into())]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_rows_are_never_queried() {
    let h = harness(MemoryRegistry::with_instances([instance_with(
        "T1",
        5,
        InstanceStatus::Failed,
        Some(Utc::now()),
    )]));

    let summary = h.supervisor.check_connections().await.unwrap();

    assert!(h.gateway.calls().is_empty());
    assert_eq!(summary.skipped_failed, 1);
    assert_eq!(summary.snapshot.total, 1);
    assert_eq!(summary.snapshot.health_rate, 0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_registry_aborts_cycle() {
    let h = harness(connected_now("T1", 1));
    h.registry.set_unavailable(true);

    let result = h.supervisor.check_connections().await;

    assert!(result.is_err());
    assert!(h.gateway.calls().is_empty());
    assert_eq!(h.sink.kinds(), vec!["check-error"]);

    // The next cycle recovers on its own.
    h.registry.set_unavailable(false);
    assert!(h.supervisor.check_connections().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn concurrent_checks_do_not_overlap() {
    let h = harness(MemoryRegistry::with_instances([
        instance_with("T1", 1, InstanceStatus::Connected, Some(Utc::now())),
        instance_with("T1", 2, InstanceStatus::Connected, Some(Utc::now())),
    ]));
    h.gateway.set_state_delay(Duration::from_secs(1));

    let (a, b) = tokio::join!(
        h.supervisor.check_connections(),
        h.supervisor.check_connections()
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(h.gateway.max_concurrent_state_queries(), 1);
    assert_eq!(h.registry.snapshots().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn health_snapshot_is_persisted_each_cycle() {
    let h = harness(MemoryRegistry::with_instances([
        instance_with("T1", 1, InstanceStatus::Connected, Some(Utc::now())),
        instance_with("T1", 2, InstanceStatus::Connecting, None),
        instance_with("T1", 3, InstanceStatus::Inactive, None),
    ]));
    h.gateway.set_state("T1_wa_2", ConnectionState::Connecting);

    h.supervisor.check_connections().await.unwrap();

    let snaps = h.registry.snapshots();
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].healthy, 1);
    assert_eq!(snaps[0].total, 2);
    assert_eq!(snaps[0].health_rate, 50);
}

#[tokio::test(start_paused = true)]
async fn full_health_check_reports_every_component() {
    let h = harness(connected_now("T1", 1));
    h.gateway
        .set_health(HealthStatus::Unhealthy("connection refused".into()));

    let report = h.supervisor.full_health_check().await;

    assert_eq!(
        report.evolution_health,
        HealthStatus::Unhealthy("connection refused".into())
    );
    assert!(report.database_health.is_healthy());
    assert_eq!(h.sink.kinds(), vec!["full-health-check"]);
    assert_eq!(h.gateway.calls(), vec![GatewayCall::HealthCheck]);
    assert!(h.supervisor.stats().last_health_check.is_some());
    assert_eq!(
        h.registry.get(&key("T1", 1)).unwrap().status,
        InstanceStatus::Connected
    );
}

#[tokio::test(start_paused = true)]
async fn jobs_run_on_their_timers() {
    let h = harness(connected_now("T1", 1));
    h.supervisor.initialize();
    assert!(h.supervisor.is_running());
    assert_eq!(h.sink.kinds(), vec!["service-started"]);

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert!(h.registry.snapshots().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.registry.snapshots().len(), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.registry.snapshots().len(), 2);

    tokio::time::sleep(Duration::from_secs(900 - 241 + 1)).await;
    assert_eq!(h.sink.count("full-health-check"), 1);

    h.supervisor.stop().await;
    assert!(!h.supervisor.is_running());
    assert_eq!(h.sink.kinds().last(), Some(&"service-stopped"));

    // Nothing runs after stop.
    let before = h.registry.snapshots().len();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.registry.snapshots().len(), before);
}

#[tokio::test(start_paused = true)]
async fn reset_job_clears_counters_hourly() {
    let h = harness(connected_now("T1", 1));
    h.gateway.set_state("T1_wa_1", ConnectionState::Close);
    h.gateway.set_reconnect("T1_wa_1", ReconnectOutcome::NoQr);

    h.supervisor.check_connections().await.unwrap();
    assert_eq!(h.supervisor.stats().active_retries, 1);

    h.supervisor.initialize();
    // Stop the connection job from adding attempts: the row goes inactive.
    h.registry.insert(instance_with("T1", 1, InstanceStatus::Inactive, None));

    tokio::time::sleep(Duration::from_secs(3601)).await;
    assert_eq!(h.supervisor.stats().active_retries, 0);
    h.supervisor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn initialize_twice_starts_once() {
    let h = harness(MemoryRegistry::new());
    h.supervisor.initialize();
    h.supervisor.initialize();
    assert_eq!(h.sink.count("service-started"), 1);

    h.supervisor.stop().await;
    h.supervisor.stop().await;
    assert_eq!(h.sink.count("service-stopped"), 1);
}
