// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use evobridge_core::{EvobridgeError, InstanceRegistry, SessionGateway};
use evobridge_supervisor::Supervisor;

use crate::auth::{AuthConfig, auth_middleware};
use crate::hub::EventHub;
use crate::{handlers, webhook, ws};

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: std::time::Instant,
    /// Renders Prometheus text for `/metrics`; `None` disables the route.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            prometheus_render,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<dyn InstanceRegistry>,
    pub gateway: Arc<dyn SessionGateway>,
    /// `None` when the supervisor is disabled in configuration.
    pub supervisor: Option<Arc<Supervisor>>,
    pub hub: EventHub,
    pub auth: AuthConfig,
    pub health: HealthState,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the full route table.
///
/// - `GET /health`, `GET /metrics`, `POST /webhooks/evolution` are public;
/// - `/v1/*` requires the bearer token;
/// - `GET /ws` authenticates during the handshake.
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .route("/webhooks/evolution", post(webhook::post_evolution_webhook))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/instances", get(handlers::list_instances))
        .route("/v1/supervisor", get(handlers::get_supervisor))
        .route(
            "/v1/tenants/{tenant}",
            post(handlers::provision_tenant).delete(handlers::offboard_tenant),
        )
        .route(
            "/v1/instances/{tenant}/{slot}/connect",
            post(handlers::connect_instance),
        )
        .route(
            "/v1/instances/{tenant}/{slot}/disconnect",
            post(handlers::disconnect_instance),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds and serves until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), EvobridgeError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EvobridgeError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(%addr, "gateway server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| EvobridgeError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway server stopped");
    Ok(())
}
