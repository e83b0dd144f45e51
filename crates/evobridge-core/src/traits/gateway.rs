// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session gateway trait for the external WhatsApp gateway service.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::EvobridgeError;
use crate::types::{ConnectionReport, HealthStatus, ReconnectPayload};

/// Client for the gateway that owns the actual WhatsApp sessions.
///
/// Sessions are addressed by their gateway name (`{tenant}_wa_{slot}`).
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Queries the live session state. Never fails: transport errors,
    /// timeouts and unparseable bodies are reported as
    /// [`ConnectionState::Unknown`](crate::types::ConnectionState::Unknown)
    /// with the cause in `detail`.
    async fn connection_state(&self, session: &str) -> ConnectionReport;

    /// Asks the gateway to reconnect the session. `Ok(None)` means the
    /// gateway answered but issued no QR and did not resume.
    async fn request_reconnect(
        &self,
        session: &str,
    ) -> Result<Option<ReconnectPayload>, EvobridgeError>;

    async fn restart(&self, session: &str) -> Result<(), EvobridgeError>;

    async fn delete_session(&self, session: &str) -> Result<(), EvobridgeError>;

    /// Creates the session. A session that already exists counts as success.
    async fn create_session(&self, session: &str) -> Result<(), EvobridgeError>;

    /// Deletes the session, waits `settle`, then creates it again.
    async fn recreate(&self, session: &str, settle: Duration) -> Result<(), EvobridgeError> {
        if let Err(e) = self.delete_session(session).await {
            // A missing session is the usual reason to recreate.
            tracing::debug!(session, error = %e, "delete before recreate failed, continuing");
        }
        tokio::time::sleep(settle).await;
        self.create_session(session).await
    }

    /// Logs the WhatsApp account out of the session.
    async fn logout(&self, session: &str) -> Result<(), EvobridgeError>;

    async fn health_check(&self) -> HealthStatus;
}
