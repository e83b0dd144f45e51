// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution API request and response bodies.

use serde::{Deserialize, Serialize};

/// Integration type sent when creating a session.
pub const INTEGRATION_BAILEYS: &str = "WHATSAPP-BAILEYS";

/// `{ "instance": { "state": ... } }` fragment used by newer API versions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceState {
    #[serde(default, alias = "instanceName")]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Body of `GET /instance/connectionState/{name}`.
///
/// Older servers answer `{"state": "open"}`, newer ones
/// `{"instance": {"instanceName": "...", "state": "open"}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionStateResponse {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub instance: Option<InstanceState>,
}

impl ConnectionStateResponse {
    pub fn state(&self) -> Option<&str> {
        self.instance
            .as_ref()
            .and_then(|i| i.state.as_deref())
            .or(self.state.as_deref())
    }
}

/// Body of `GET /instance/connect/{name}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectResponse {
    /// Ready-made image data URL.
    #[serde(default)]
    pub base64: Option<String>,
    /// Raw pairing payload to encode into a QR image.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "pairingCode")]
    pub pairing_code: Option<String>,
    /// Present when the session is already connected.
    #[serde(default)]
    pub instance: Option<InstanceState>,
}

/// Body of `POST /instance/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest<'a> {
    pub instance_name: &'a str,
    pub qrcode: bool,
    pub integration: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_by_events: Option<bool>,
}

/// Error envelope; Evolution nests the message in a few different places.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub response: Option<ApiErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    /// Flattens every message fragment into one string.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(e) = &self.error {
            parts.push(e.clone());
        }
        for value in [
            self.message.as_ref(),
            self.response.as_ref().and_then(|r| r.message.as_ref()),
        ]
        .into_iter()
        .flatten()
        {
            match value {
                serde_json::Value::String(s) => parts.push(s.clone()),
                serde_json::Value::Array(items) => parts.extend(
                    items
                        .iter()
                        .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string)),
                ),
                other => parts.push(other.to_string()),
            }
        }
        parts.join("; ")
    }
}
