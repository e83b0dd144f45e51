// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reconnection supervisor.
//!
//! Three periodic jobs run independently once [`Supervisor::initialize`] is
//! called:
//! - **connection check**: classify every monitorable instance and remediate
//!   the unhealthy ones within a bounded retry budget;
//! - **full health check**: probe the gateway, the registry and the process;
//! - **counter reset**: clear the in-memory retry budget.
//!
//! Each job body is serialized by its own async mutex, so a manual trigger
//! that lands while the timer-driven run is executing waits for it.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use evobridge_core::{
    ConnectionReport, ConnectionState, EvobridgeError, HealthSnapshot, HealthStatus, Instance,
    InstanceRegistry, InstanceStatus, MAX_ATTEMPTS_EXCEEDED, NotificationSink, SessionGateway,
    SupervisorEvent, SystemHealth, UnhealthyReason,
};

use crate::classify::{Verdict, classify};
use crate::retry::{Attempt, RetryBudget};
use crate::settings::{SupervisorSettings, chrono_span};
use crate::system::system_health;

/// Result of one connection-check cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub snapshot: HealthSnapshot,
    /// Instances skipped because they are already `failed`.
    pub skipped_failed: usize,
    pub unhealthy: usize,
    pub recovered: usize,
    /// Instances marked failed during this cycle.
    pub failed: usize,
}

/// Result of a full health check, also emitted as `full-health-check`.
#[derive(Debug, Clone, Serialize)]
pub struct FullHealthReport {
    pub evolution_health: HealthStatus,
    pub database_health: HealthStatus,
    pub system_health: SystemHealth,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryEntry {
    pub instance: String,
    pub attempts: u32,
}

/// Point-in-time view of the supervisor for operators.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub running: bool,
    /// Completion time of the last full health check.
    pub last_health_check: Option<DateTime<Utc>>,
    /// Snapshot written by the last connection check.
    pub last_snapshot: Option<HealthSnapshot>,
    pub active_retries: usize,
    pub retry_attempts: Vec<RetryEntry>,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Remediation {
    Recovered,
    Retrying,
    Failed,
}

struct Running {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    registry: Arc<dyn InstanceRegistry>,
    gateway: Arc<dyn SessionGateway>,
    sink: Arc<dyn NotificationSink>,
    settings: SupervisorSettings,
    retries: RetryBudget,
    check_lock: tokio::sync::Mutex<()>,
    health_lock: tokio::sync::Mutex<()>,
    reset_lock: tokio::sync::Mutex<()>,
    last_snapshot: Mutex<Option<HealthSnapshot>>,
    last_full_health: Mutex<Option<DateTime<Utc>>>,
    started: Instant,
}

/// Periodic health checker and auto-reconnector for every instance.
pub struct Supervisor {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<dyn InstanceRegistry>,
        gateway: Arc<dyn SessionGateway>,
        sink: Arc<dyn NotificationSink>,
        settings: SupervisorSettings,
    ) -> Self {
        let retries = RetryBudget::new(settings.max_retries);
        Self {
            inner: Arc::new(Inner {
                registry,
                gateway,
                sink,
                settings,
                retries,
                check_lock: tokio::sync::Mutex::new(()),
                health_lock: tokio::sync::Mutex::new(()),
                reset_lock: tokio::sync::Mutex::new(()),
                last_snapshot: Mutex::new(None),
                last_full_health: Mutex::new(None),
                started: Instant::now(),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|r| r.is_some())
            .unwrap_or(false)
    }

    /// Spawns the three periodic jobs and emits `service-started`.
    ///
    /// Must be called from within a tokio runtime. Calling it while already
    /// running is a no-op.
    pub fn initialize(&self) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if running.is_some() {
            warn!("supervisor already running");
            return;
        }

        let settings = &self.inner.settings;
        let cancel = CancellationToken::new();

        let check = {
            let inner = self.inner.clone();
            spawn_job("connection-check", settings.check_interval, cancel.clone(), move || {
                let inner = inner.clone();
                async move {
                    if let Err(e) = inner.check_connections().await {
                        debug!(error = %e, "connection check skipped");
                    }
                }
            })
        };
        let health = {
            let inner = self.inner.clone();
            spawn_job("full-health-check", settings.health_interval, cancel.clone(), move || {
                let inner = inner.clone();
                async move {
                    inner.full_health_check().await;
                }
            })
        };
        let reset = {
            let inner = self.inner.clone();
            spawn_job("counter-reset", settings.reset_interval, cancel.clone(), move || {
                let inner = inner.clone();
                async move {
                    inner.reset_retry_counters().await;
                }
            })
        };

        *running = Some(Running {
            cancel,
            tasks: vec![check, health, reset],
        });
        drop(running);

        info!(
            check_interval_secs = settings.check_interval.as_secs(),
            health_interval_secs = settings.health_interval.as_secs(),
            reset_interval_secs = settings.reset_interval.as_secs(),
            max_retries = settings.max_retries,
            "supervisor started"
        );
        self.inner.sink.publish(SupervisorEvent::ServiceStarted {
            timestamp: Utc::now(),
        });
    }

    /// Cancels the jobs, waits for in-flight bodies, emits `service-stopped`.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        let Some(running) = running else {
            debug!("supervisor not running, nothing to stop");
            return;
        };

        running.cancel.cancel();
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "supervisor job ended abnormally");
            }
        }

        info!("supervisor stopped");
        self.inner.sink.publish(SupervisorEvent::ServiceStopped {
            timestamp: Utc::now(),
        });
    }

    /// Runs one connection-check cycle now.
    ///
    /// Fails only when the monitorable instances cannot be listed; a
    /// `check-error` event has been emitted in that case.
    pub async fn check_connections(&self) -> Result<CheckSummary, EvobridgeError> {
        self.inner.check_connections().await
    }

    /// Probes the gateway, the registry and the process, and emits
    /// `full-health-check`. Never mutates instances.
    pub async fn full_health_check(&self) -> FullHealthReport {
        self.inner.full_health_check().await
    }

    /// Clears the in-memory retry budget. Returns how many counters were set.
    pub async fn reset_retry_counters(&self) -> usize {
        self.inner.reset_retry_counters().await
    }

    pub fn stats(&self) -> ServiceStats {
        let inner = &self.inner;
        let retry_attempts = inner
            .retries
            .snapshot()
            .into_iter()
            .map(|(key, attempts)| RetryEntry {
                instance: key.session_name(),
                attempts,
            })
            .collect::<Vec<_>>();
        ServiceStats {
            running: self.is_running(),
            last_health_check: *inner
                .last_full_health
                .lock()
                .unwrap_or_else(|p| p.into_inner()),
            last_snapshot: inner
                .last_snapshot
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
            active_retries: retry_attempts.len(),
            retry_attempts,
            max_retries: inner.retries.max(),
        }
    }
}

/// Spawns a periodic job. The first run happens one `period` after start;
/// missed ticks are delayed rather than bursted. Cancellation is observed
/// between runs, never inside one.
fn spawn_job<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    body: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(job = name, "supervisor job shutting down");
                    break;
                }
                _ = interval.tick() => {
                    debug!(job = name, "supervisor job tick");
                    body().await;
                }
            }
        }
    })
}

impl Inner {
    async fn check_connections(&self) -> Result<CheckSummary, EvobridgeError> {
        let _guard = self.check_lock.lock().await;
        let cycle_started = Instant::now();
        let now = Utc::now();

        let candidates = match self
            .registry
            .list_monitorable(now, chrono_span(self.settings.monitor_window))
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "connection check aborted: cannot list instances");
                evobridge_prometheus::record_check_error();
                self.sink.publish(SupervisorEvent::CheckError {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let stale_after = chrono_span(self.settings.stale_after);
        let mut healthy = 0;
        let mut skipped_failed = 0;
        let mut unhealthy = Vec::new();

        for instance in &candidates {
            if instance.status == InstanceStatus::Failed {
                skipped_failed += 1;
                continue;
            }
            let report = self.query_state(&instance.session_name).await;
            match classify(instance, &report, now, stale_after) {
                Verdict::Healthy => healthy += 1,
                Verdict::Unhealthy(reason) => {
                    debug!(
                        instance = %instance.session_name,
                        %reason,
                        state = %report.state,
                        detail = report.detail.as_deref().unwrap_or(""),
                        "instance unhealthy"
                    );
                    unhealthy.push((instance, reason));
                }
            }
        }

        let mut recovered = 0;
        let mut failed = 0;
        for (instance, reason) in &unhealthy {
            match self.remediate(instance, *reason).await {
                Remediation::Recovered => recovered += 1,
                Remediation::Failed => failed += 1,
                Remediation::Retrying => {}
            }
        }

        let snapshot = HealthSnapshot::new(healthy, candidates.len(), Utc::now());
        if let Err(e) = self.registry.record_health_metrics(&snapshot).await {
            warn!(error = %e, "failed to persist health snapshot");
        }
        evobridge_prometheus::record_health_snapshot(&snapshot);
        evobridge_prometheus::set_active_retries(self.retries.active());
        evobridge_prometheus::record_check_cycle(cycle_started.elapsed().as_secs_f64());

        info!(
            healthy = snapshot.healthy,
            total = snapshot.total,
            health_rate = snapshot.health_rate,
            unhealthy = unhealthy.len(),
            recovered,
            failed,
            "connection check complete"
        );

        *self.last_snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot.clone());

        Ok(CheckSummary {
            snapshot,
            skipped_failed,
            unhealthy: unhealthy.len(),
            recovered,
            failed,
        })
    }

    async fn query_state(&self, session: &str) -> ConnectionReport {
        let timeout = self.settings.state_timeout;
        match tokio::time::timeout(timeout, self.gateway.connection_state(session)).await {
            Ok(report) => report,
            Err(_) => ConnectionReport::unknown(format!("state query timed out after {timeout:?}")),
        }
    }

    async fn remediate(&self, instance: &Instance, reason: UnhealthyReason) -> Remediation {
        let max_retries = self.retries.max();
        let attempt = match self.retries.begin(&instance.key) {
            Attempt::Proceed(n) => n,
            Attempt::Exhausted => {
                debug!(
                    instance = %instance.session_name,
                    "retry budget exhausted, no reconnection attempt"
                );
                return if self.fail_instance(instance).await {
                    Remediation::Failed
                } else {
                    Remediation::Retrying
                };
            }
        };

        info!(
            instance = %instance.session_name,
            %reason,
            attempt,
            max_retries,
            "attempting reconnection"
        );
        evobridge_prometheus::record_reconnection_attempt(&reason.to_string());
        self.sink.publish(SupervisorEvent::ReconnectionAttempt {
            instance: instance.session_name.clone(),
            attempt,
            max_retries,
        });

        let outcome = self.dispatch(&instance.session_name, reason).await;

        match outcome {
            Ok(true) => {
                self.retries.reset(&instance.key);
                match self.registry.mark_reconnecting(&instance.key).await {
                    Ok(()) => {
                        info!(instance = %instance.session_name, attempt, "reconnection succeeded");
                        evobridge_prometheus::record_reconnection_success();
                        self.sink.publish(SupervisorEvent::ReconnectionSuccess {
                            instance: instance.session_name.clone(),
                            tenant_id: instance.key.tenant_id.clone(),
                        });
                        Remediation::Recovered
                    }
                    Err(e) => {
                        warn!(
                            instance = %instance.session_name,
                            error = %e,
                            "reconnection succeeded but registry update failed"
                        );
                        Remediation::Retrying
                    }
                }
            }
            Ok(false) => {
                warn!(instance = %instance.session_name, attempt, "reconnection attempt did not recover the session");
                self.after_failed_attempt(instance, attempt).await
            }
            Err(e) => {
                warn!(instance = %instance.session_name, attempt, error = %e, "reconnection attempt failed");
                self.after_failed_attempt(instance, attempt).await
            }
        }
    }

    async fn after_failed_attempt(&self, instance: &Instance, attempt: u32) -> Remediation {
        if attempt >= self.retries.max() && self.fail_instance(instance).await {
            Remediation::Failed
        } else {
            Remediation::Retrying
        }
    }

    /// Gateway calls for one remediation. `Ok(true)` means the session is
    /// back on its way. Each call gets its own `remediation_timeout`; the
    /// settle sleeps between them are not counted against it.
    async fn dispatch(&self, session: &str, reason: UnhealthyReason) -> Result<bool, EvobridgeError> {
        match reason {
            UnhealthyReason::EvolutionDisconnected => {
                Ok(self.bounded(self.gateway.request_reconnect(session)).await?.is_some())
            }
            UnhealthyReason::InactiveConnection => {
                self.bounded(self.gateway.restart(session)).await?;
                tokio::time::sleep(self.settings.restart_settle).await;
                let report = self.query_state(session).await;
                Ok(matches!(
                    report.state,
                    ConnectionState::Open | ConnectionState::Connecting
                ))
            }
            UnhealthyReason::SessionMissing => {
                if let Err(e) = self.bounded(self.gateway.delete_session(session)).await {
                    // A missing session is the usual reason to recreate.
                    debug!(instance = session, error = %e, "delete before recreate failed, continuing");
                }
                tokio::time::sleep(self.settings.recreate_settle).await;
                self.bounded(self.gateway.create_session(session)).await?;
                Ok(self.bounded(self.gateway.request_reconnect(session)).await?.is_some())
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, EvobridgeError>>,
    ) -> Result<T, EvobridgeError> {
        let timeout = self.settings.remediation_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or_else(|_| Err(EvobridgeError::Timeout { duration: timeout }))
    }

    /// Marks the instance failed and emits `instance-failed`. Returns `false`
    /// when the registry update did not go through; the event is withheld
    /// and the next cycle tries again.
    async fn fail_instance(&self, instance: &Instance) -> bool {
        match self
            .registry
            .mark_failed(&instance.key, MAX_ATTEMPTS_EXCEEDED)
            .await
        {
            Ok(()) => {
                error!(
                    instance = %instance.session_name,
                    tenant_id = %instance.key.tenant_id,
                    "instance failed: reconnection attempts exhausted"
                );
                evobridge_prometheus::record_instance_failed();
                self.sink.publish(SupervisorEvent::InstanceFailed {
                    instance: instance.session_name.clone(),
                    tenant_id: instance.key.tenant_id.clone(),
                    reason: MAX_ATTEMPTS_EXCEEDED.to_string(),
                });
                true
            }
            Err(e) => {
                warn!(instance = %instance.session_name, error = %e, "failed to mark instance failed");
                false
            }
        }
    }

    async fn full_health_check(&self) -> FullHealthReport {
        let _guard = self.health_lock.lock().await;

        let timeout = self.settings.remediation_timeout;
        let evolution_health = tokio::time::timeout(timeout, self.gateway.health_check())
            .await
            .unwrap_or_else(|_| HealthStatus::Unhealthy(format!("timed out after {timeout:?}")));
        let database_health = tokio::time::timeout(timeout, self.registry.health_check())
            .await
            .unwrap_or_else(|_| HealthStatus::Unhealthy(format!("timed out after {timeout:?}")));
        let system_health = system_health(self.started.elapsed());
        let timestamp = Utc::now();

        if evolution_health.is_healthy() && database_health.is_healthy() {
            info!(
                uptime_secs = system_health.uptime_secs,
                memory_bytes = system_health.memory_bytes,
                "full health check passed"
            );
        } else {
            warn!(
                evolution = ?evolution_health,
                database = ?database_health,
                "full health check found problems"
            );
        }

        *self.last_full_health.lock().unwrap_or_else(|p| p.into_inner()) = Some(timestamp);

        let report = FullHealthReport {
            evolution_health,
            database_health,
            system_health,
            timestamp,
        };
        self.sink.publish(SupervisorEvent::FullHealthCheck {
            evolution_health: report.evolution_health.clone(),
            database_health: report.database_health.clone(),
            system_health: report.system_health.clone(),
            timestamp,
        });
        report
    }

    async fn reset_retry_counters(&self) -> usize {
        let _guard = self.reset_lock.lock().await;
        let cleared = self.retries.clear();
        evobridge_prometheus::set_active_retries(0);
        info!(cleared, "reconnection counters reset");
        cleared
    }
}
