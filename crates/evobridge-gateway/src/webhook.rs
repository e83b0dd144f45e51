// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution API webhook receiver.
//!
//! Evolution posts `{"event": ..., "instance": ..., "data": {...}}`. Event
//! names arrive either dotted (`connection.update`) or, with per-event
//! webhooks, upper snake case (`CONNECTION_UPDATE`); both are accepted.
//!
//! - `connection.update` with state `open` marks the instance healthy,
//!   `close` marks it disconnected, `connecting` is ignored;
//! - `messages.upsert` bumps `last_seen_at`;
//! - everything else is acknowledged and ignored.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use evobridge_core::ConnectionState;

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct EvolutionWebhook {
    pub event: String,
    pub instance: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
    /// `false` when the event was ignored.
    pub handled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    ConnectionUpdate,
    MessagesUpsert,
    Other,
}

impl WebhookEvent {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().replace('_', ".").as_str() {
            "connection.update" => Self::ConnectionUpdate,
            "messages.upsert" => Self::MessagesUpsert,
            _ => Self::Other,
        }
    }
}

/// Phone number from the `wuid` JID (`5511999999999@s.whatsapp.net`).
pub fn phone_from(data: &serde_json::Value) -> Option<String> {
    let jid = data.get("wuid").and_then(|v| v.as_str())?;
    let number = jid.split(['@', ':']).next()?;
    (!number.is_empty() && number.chars().all(|c| c.is_ascii_digit()))
        .then(|| number.to_string())
}

/// POST /webhooks/evolution
pub async fn post_evolution_webhook(
    State(state): State<GatewayState>,
    Json(body): Json<EvolutionWebhook>,
) -> Result<Json<WebhookAck>, ApiError> {
    let event = WebhookEvent::parse(&body.event);
    if event == WebhookEvent::Other {
        tracing::debug!(event = %body.event, instance = %body.instance, "webhook event ignored");
        return Ok(Json(WebhookAck {
            received: true,
            handled: false,
        }));
    }

    let Some(instance) = state.registry.find_by_session_name(&body.instance).await? else {
        tracing::warn!(instance = %body.instance, event = %body.event, "webhook for unknown instance");
        return Ok(Json(WebhookAck {
            received: true,
            handled: false,
        }));
    };

    let handled = match event {
        WebhookEvent::ConnectionUpdate => {
            let raw = body
                .data
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            match ConnectionState::from_gateway(raw) {
                ConnectionState::Open => {
                    let phone = phone_from(&body.data);
                    state
                        .registry
                        .mark_healthy(&instance.key, phone.as_deref())
                        .await?;
                    tracing::info!(instance = %instance.session_name, "instance connected");
                    true
                }
                ConnectionState::Close => {
                    state.registry.mark_disconnected(&instance.key).await?;
                    tracing::info!(instance = %instance.session_name, "instance disconnected");
                    true
                }
                ConnectionState::Connecting | ConnectionState::Unknown => {
                    tracing::debug!(instance = %instance.session_name, state = raw, "connection update ignored");
                    false
                }
            }
        }
        WebhookEvent::MessagesUpsert => {
            state.registry.touch(&instance.key).await?;
            true
        }
        WebhookEvent::Other => false,
    };

    Ok(Json(WebhookAck {
        received: true,
        handled,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_accept_both_spellings() {
        assert_eq!(
            WebhookEvent::parse("connection.update"),
            WebhookEvent::ConnectionUpdate
        );
        assert_eq!(
            WebhookEvent::parse("CONNECTION_UPDATE"),
            WebhookEvent::ConnectionUpdate
        );
        assert_eq!(
            WebhookEvent::parse("MESSAGES_UPSERT"),
            WebhookEvent::MessagesUpsert
        );
        assert_eq!(WebhookEvent::parse("qrcode.updated"), WebhookEvent::Other);
    }

    #[test]
    fn phone_is_taken_from_wuid() {
        assert_eq!(
            phone_from(&json!({"wuid": "5511999999999@s.whatsapp.net"})),
            Some("5511999999999".to_string())
        );
        assert_eq!(
            phone_from(&json!({"wuid": "5511999999999:12@s.whatsapp.net"})),
            Some("5511999999999".to_string())
        );
        assert_eq!(phone_from(&json!({"wuid": "abc@lid"})), None);
        assert_eq!(phone_from(&json!({"state": "open"})), None);
    }

    #[test]
    fn payload_without_data_parses() {
        let body: EvolutionWebhook =
            serde_json::from_str(r#"{"event": "messages.upsert", "instance": "T1_wa_1"}"#).unwrap();
        assert!(body.data.is_null());
    }
}
