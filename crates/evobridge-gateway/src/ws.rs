// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket stream of supervisor events.
//!
//! Every event is sent as a JSON text frame tagged with its kebab-case
//! `type`, e.g. `{"type":"reconnection-attempt","instance":"T1_wa_3",...}`.
//! Clients authenticate with the bearer token, either in the
//! `Authorization` header or as `?token=` (browsers cannot set headers on
//! WebSocket handshakes).

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Response {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let query_value = params.token.map(|t| format!("Bearer {t}"));

    if !state.auth.accepts(header_value) && !state.auth.accepts(query_value.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let events = state.hub.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<evobridge_core::SupervisorEvent>) {
    let ws_id = uuid::Uuid::new_v4();
    tracing::debug!(%ws_id, "event subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(%ws_id, error = %e, "websocket error");
                    break;
                }
                // Subscribers are read-only.
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to serialize event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(%ws_id, missed, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::debug!(%ws_id, "event subscriber disconnected");
}
