// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Evolution API.
//!
//! Provides [`EvolutionClient`], which handles authentication, request
//! construction and the mapping of Evolution responses onto the
//! [`SessionGateway`] contract.

use std::time::Duration;

use async_trait::async_trait;
use evobridge_config::model::EvolutionConfig;
use evobridge_core::{
    ConnectionReport, ConnectionState, EvobridgeError, HealthStatus, ReconnectPayload,
    SessionGateway,
};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use crate::qr;
use crate::types::{
    ApiErrorResponse, ConnectResponse, ConnectionStateResponse, CreateInstanceRequest,
    INTEGRATION_BAILEYS,
};

/// HTTP client for Evolution API communication.
#[derive(Debug, Clone)]
pub struct EvolutionClient {
    client: reqwest::Client,
    base_url: String,
    webhook_url: Option<String>,
    state_timeout: Duration,
    health_path: String,
}

impl EvolutionClient {
    /// Creates a client from the `[evolution]` config section.
    ///
    /// Fails if no API key is configured or it is not a valid header value.
    pub fn new(config: &EvolutionConfig) -> Result<Self, EvobridgeError> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            EvobridgeError::Config(
                "evolution.api_key is required (or set EVOBRIDGE_EVOLUTION_API_KEY)".into(),
            )
        })?;

        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|e| EvobridgeError::Config(format!("invalid apikey header value: {e}")))?;
        key_value.set_sensitive(true);
        headers.insert("apikey", key_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EvobridgeError::Gateway {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            webhook_url: config.webhook_url.clone(),
            state_timeout: config.state_timeout(),
            health_path: config.health_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a request and converts transport failures into gateway errors.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, EvobridgeError> {
        let response = request.send().await.map_err(|e| EvobridgeError::Gateway {
            message: format!("{what}: request failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(status = %response.status(), what, "evolution response received");
        Ok(response)
    }

    /// Builds a gateway error from a non-success response body.
    async fn api_error(what: &str, response: reqwest::Response) -> EvobridgeError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::error_from_body(what, status, body)
    }

    fn error_from_body(what: &str, status: StatusCode, body: String) -> EvobridgeError {
        let detail = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(err) if !err.summary().is_empty() => err.summary(),
            _ => body,
        };
        EvobridgeError::gateway(format!("{what}: Evolution API returned {status}: {detail}"))
    }

    /// Runs a request whose body we do not need.
    async fn expect_success(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<(), EvobridgeError> {
        let response = self.send(request, what).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(what, response).await)
        }
    }
}

#[async_trait]
impl SessionGateway for EvolutionClient {
    async fn connection_state(&self, session: &str) -> ConnectionReport {
        let request = self
            .client
            .get(self.url(&format!("/instance/connectionState/{session}")))
            .timeout(self.state_timeout);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return ConnectionReport::unknown(format!(
                    "state query timed out after {:?}",
                    self.state_timeout
                ));
            }
            Err(e) => return ConnectionReport::unknown(format!("state query failed: {e}")),
        };

        match response.status() {
            StatusCode::NOT_FOUND => return ConnectionReport::missing(),
            status if !status.is_success() => {
                return ConnectionReport::unknown(format!("Evolution API returned {status}"));
            }
            _ => {}
        }

        match response.json::<ConnectionStateResponse>().await {
            Ok(body) => match body.state() {
                Some(raw) => {
                    let state = ConnectionState::from_gateway(raw);
                    let mut report = ConnectionReport::new(state);
                    if state == ConnectionState::Unknown {
                        report.detail = Some(format!("unrecognised state `{raw}`"));
                    }
                    report
                }
                None => ConnectionReport::unknown("response carried no state"),
            },
            Err(e) => ConnectionReport::unknown(format!("unparseable state response: {e}")),
        }
    }

    async fn request_reconnect(
        &self,
        session: &str,
    ) -> Result<Option<ReconnectPayload>, EvobridgeError> {
        let what = "connect";
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/instance/connect/{session}"))),
                what,
            )
            .await?;

        if !response.status().is_success() {
            let err = Self::api_error(what, response).await;
            if err.to_string().contains("already connected") {
                info!(session, "session already connected");
                return Ok(Some(ReconnectPayload::Resumed));
            }
            return Err(err);
        }

        let body: ConnectResponse = response.json().await.map_err(|e| EvobridgeError::Gateway {
            message: format!("{what}: unparseable response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body
            .instance
            .as_ref()
            .and_then(|i| i.state.as_deref())
            .is_some_and(|s| s == "open")
        {
            return Ok(Some(ReconnectPayload::Resumed));
        }

        let payload = match (body.base64, body.code) {
            (Some(image), code) if qr::is_data_url(&image) => Some(ReconnectPayload::Qr {
                code: code.unwrap_or_default(),
                data_url: image,
            }),
            (Some(image), code) => Some(ReconnectPayload::Qr {
                code: code.unwrap_or_default(),
                data_url: format!("data:image/png;base64,{image}"),
            }),
            (None, Some(code)) if !code.is_empty() => Some(ReconnectPayload::Qr {
                data_url: qr::render_data_url(&code)?,
                code,
            }),
            _ => None,
        };

        if payload.is_none() {
            warn!(session, pairing_code = ?body.pairing_code, "connect returned no QR");
        }
        Ok(payload)
    }

    async fn restart(&self, session: &str) -> Result<(), EvobridgeError> {
        self.expect_success(
            self.client
                .post(self.url(&format!("/instance/restart/{session}"))),
            "restart",
        )
        .await
    }

    async fn delete_session(&self, session: &str) -> Result<(), EvobridgeError> {
        self.expect_success(
            self.client
                .delete(self.url(&format!("/instance/delete/{session}"))),
            "delete",
        )
        .await
    }

    async fn create_session(&self, session: &str) -> Result<(), EvobridgeError> {
        let what = "create";
        let body = CreateInstanceRequest {
            instance_name: session,
            qrcode: true,
            integration: INTEGRATION_BAILEYS,
            webhook: self.webhook_url.as_deref(),
            webhook_by_events: self.webhook_url.as_ref().map(|_| true),
        };
        let response = self
            .send(
                self.client.post(self.url("/instance/create")).json(&body),
                what,
            )
            .await?;

        match response.status() {
            s if s.is_success() => {
                info!(session, "session created on Evolution API");
                Ok(())
            }
            StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                let lowered = body.to_lowercase();
                if lowered.contains("already in use") || lowered.contains("already exists") {
                    info!(session, "session already exists on Evolution API");
                    Ok(())
                } else {
                    Err(Self::error_from_body(what, StatusCode::FORBIDDEN, body))
                }
            }
            _ => Err(Self::api_error(what, response).await),
        }
    }

    async fn logout(&self, session: &str) -> Result<(), EvobridgeError> {
        self.expect_success(
            self.client
                .delete(self.url(&format!("/instance/logout/{session}"))),
            "logout",
        )
        .await
    }

    async fn health_check(&self) -> HealthStatus {
        match self.client.get(self.url(&self.health_path)).send().await {
            Ok(r) if r.status().is_success() => HealthStatus::Healthy,
            Ok(r) => HealthStatus::Degraded(format!("Evolution API returned {}", r.status())),
            Err(e) => HealthStatus::Unhealthy(format!("Evolution API unreachable: {e}")),
        }
    }
}
