// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end WebSocket delivery over a real listener.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;

use evobridge_core::{NotificationSink, SupervisorEvent, TenantId};
use evobridge_gateway::{AuthConfig, ChannelSink, EventHub, GatewayState, HealthState, router};
use evobridge_test_utils::{MemoryRegistry, MockGateway};
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "ws-token";

async fn serve(hub: EventHub) -> SocketAddr {
    let state = GatewayState {
        registry: Arc::new(MemoryRegistry::new()),
        gateway: Arc::new(MockGateway::new()),
        supervisor: None,
        hub,
        auth: AuthConfig {
            bearer_token: Some(TOKEN.to_string()),
        },
        health: HealthState::new(None),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn subscribers_receive_sink_events_as_json() {
    let hub = EventHub::new(16);
    let (sink, rx) = ChannelSink::channel(16);
    let cancel = CancellationToken::new();
    let drain = hub.spawn_drain(rx, cancel.clone());
    let addr = serve(hub.clone()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?token={TOKEN}"))
        .await
        .unwrap();
    assert_eq!(hub.subscriber_count(), 1);

    sink.publish(SupervisorEvent::ReconnectionSuccess {
        instance: "T1_wa_3".into(),
        tenant_id: TenantId::new("T1"),
    });

    let frame = ws.next().await.unwrap().unwrap();
    let json: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(json["type"], "reconnection-success");
    assert_eq!(json["instance"], "T1_wa_3");
    assert_eq!(json["tenant_id"], "T1");

    cancel.cancel();
    drain.await.unwrap();
}

#[tokio::test]
async fn handshake_without_token_is_rejected() {
    let addr = serve(EventHub::new(4)).await;
    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await;
    assert!(result.is_err());

    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?token=wrong")).await;
    assert!(result.is_err());
}
