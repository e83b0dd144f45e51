// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted session gateway for deterministic testing.
//!
//! Every call is appended to a log that tests can assert on. Connection
//! states, reconnect outcomes and restart/create results are scripted per
//! session; unscripted sessions report `open` and succeed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use evobridge_core::{
    ConnectionReport, ConnectionState, EvobridgeError, HealthStatus, ReconnectPayload,
    SessionGateway,
};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ConnectionState(String),
    RequestReconnect(String),
    Restart(String),
    Delete(String),
    Create(String),
    Logout(String),
    HealthCheck,
}

impl GatewayCall {
    /// `true` for calls that try to repair a session.
    pub fn is_remediation(&self) -> bool {
        matches!(
            self,
            GatewayCall::RequestReconnect(_)
                | GatewayCall::Restart(_)
                | GatewayCall::Delete(_)
                | GatewayCall::Create(_)
        )
    }
}

/// What `request_reconnect` returns for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Qr,
    Resumed,
    NoQr,
    Fail,
}

#[derive(Debug, Default)]
struct Script {
    states: HashMap<String, ConnectionReport>,
    reconnect: HashMap<String, ReconnectOutcome>,
    state_after_restart: HashMap<String, ConnectionState>,
    failing_restart: Vec<String>,
    failing_create: Vec<String>,
    health: Option<HealthStatus>,
}

#[derive(Debug, Default)]
pub struct MockGateway {
    script: Mutex<Script>,
    calls: Mutex<Vec<GatewayCall>>,
    state_delay: Mutex<Option<Duration>>,
    remediation_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, call: GatewayCall) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(call);
    }

    /// Scripts the state reported for `session`.
    pub fn set_state(&self, session: &str, state: ConnectionState) {
        self.script()
            .states
            .insert(session.to_string(), ConnectionReport::new(state));
    }

    /// Makes the gateway report `session` as unknown to it (HTTP 404).
    pub fn set_missing(&self, session: &str) {
        self.script()
            .states
            .insert(session.to_string(), ConnectionReport::missing());
    }

    pub fn set_reconnect(&self, session: &str, outcome: ReconnectOutcome) {
        self.script()
            .reconnect
            .insert(session.to_string(), outcome);
    }

    /// State the session reports once `restart` has been called.
    pub fn set_state_after_restart(&self, session: &str, state: ConnectionState) {
        self.script()
            .state_after_restart
            .insert(session.to_string(), state);
    }

    pub fn fail_restart(&self, session: &str) {
        self.script().failing_restart.push(session.to_string());
    }

    pub fn fail_create(&self, session: &str) {
        self.script().failing_create.push(session.to_string());
    }

    pub fn set_health(&self, health: HealthStatus) {
        self.script().health = Some(health);
    }

    /// Delays every `connection_state` call, to widen the in-flight window.
    pub fn set_state_delay(&self, delay: Duration) {
        *self.state_delay.lock().unwrap_or_else(|p| p.into_inner()) = Some(delay);
    }

    /// Delays every reconnect, restart, delete and create call.
    pub fn set_remediation_delay(&self, delay: Duration) {
        *self
            .remediation_delay
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(delay);
    }

    async fn remediation_pause(&self) {
        let delay = *self
            .remediation_delay
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Remediation calls (reconnect, restart, delete, create) in order.
    pub fn remediation_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(GatewayCall::is_remediation)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    /// Highest number of concurrent `connection_state` calls observed.
    pub fn max_concurrent_state_queries(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionGateway for MockGateway {
    async fn connection_state(&self, session: &str) -> ConnectionReport {
        self.record(GatewayCall::ConnectionState(session.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.state_delay.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let report = self
            .script()
            .states
            .get(session)
            .cloned()
            .unwrap_or_else(|| ConnectionReport::new(ConnectionState::Open));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        report
    }

    async fn request_reconnect(
        &self,
        session: &str,
    ) -> Result<Option<ReconnectPayload>, EvobridgeError> {
        self.record(GatewayCall::RequestReconnect(session.to_string()));
        self.remediation_pause().await;
        let outcome = self
            .script()
            .reconnect
            .get(session)
            .cloned()
            .unwrap_or(ReconnectOutcome::Qr);
        match outcome {
            ReconnectOutcome::Qr => Ok(Some(ReconnectPayload::Qr {
                code: format!("2@{session}"),
                data_url: format!("data:image/png;base64,{session}"),
            })),
            ReconnectOutcome::Resumed => Ok(Some(ReconnectPayload::Resumed)),
            ReconnectOutcome::NoQr => Ok(None),
            ReconnectOutcome::Fail => Err(EvobridgeError::gateway(format!(
                "connect {session}: Evolution API returned 500"
            ))),
        }
    }

    async fn restart(&self, session: &str) -> Result<(), EvobridgeError> {
        self.record(GatewayCall::Restart(session.to_string()));
        self.remediation_pause().await;
        let mut script = self.script();
        if script.failing_restart.iter().any(|s| s == session) {
            return Err(EvobridgeError::gateway(format!("restart {session} failed")));
        }
        if let Some(state) = script.state_after_restart.get(session).copied() {
            script
                .states
                .insert(session.to_string(), ConnectionReport::new(state));
        }
        Ok(())
    }

    async fn delete_session(&self, session: &str) -> Result<(), EvobridgeError> {
        self.record(GatewayCall::Delete(session.to_string()));
        self.remediation_pause().await;
        Ok(())
    }

    async fn create_session(&self, session: &str) -> Result<(), EvobridgeError> {
        self.record(GatewayCall::Create(session.to_string()));
        self.remediation_pause().await;
        let mut script = self.script();
        if script.failing_create.iter().any(|s| s == session) {
            return Err(EvobridgeError::gateway(format!("create {session} failed")));
        }
        // A recreated session exists again, though not yet paired.
        if script.states.get(session).is_some_and(|r| r.not_found) {
            script.states.insert(
                session.to_string(),
                ConnectionReport::new(ConnectionState::Close),
            );
        }
        Ok(())
    }

    async fn logout(&self, session: &str) -> Result<(), EvobridgeError> {
        self.record(GatewayCall::Logout(session.to_string()));
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        self.record(GatewayCall::HealthCheck);
        self.script()
            .health
            .clone()
            .unwrap_or(HealthStatus::Healthy)
    }
}
