// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `evobridge serve` command implementation.
//!
//! Opens the registry, connects the Evolution client, starts the supervisor
//! jobs and the HTTP/WebSocket gateway, then waits for SIGINT/SIGTERM and
//! tears everything down in reverse order.

use std::sync::Arc;

use evobridge_config::EvobridgeConfig;
use evobridge_core::EvobridgeError;
use evobridge_evolution::EvolutionClient;
use evobridge_gateway::{
    AuthConfig, ChannelSink, EventHub, GatewayState, HealthState, ServerConfig, start_server,
};
use evobridge_prometheus::PrometheusExporter;
use evobridge_storage::SqliteRegistry;
use evobridge_supervisor::{Supervisor, SupervisorSettings};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::shutdown;

/// Runs the service until a shutdown signal arrives.
pub async fn run_serve(config: EvobridgeConfig) -> Result<(), EvobridgeError> {
    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        "starting evobridge serve"
    );

    let registry = Arc::new(SqliteRegistry::open(&config.storage).await?);
    info!(path = %config.storage.database_path, "instance registry opened");

    let gateway = Arc::new(EvolutionClient::new(&config.evolution)?);
    info!(api_url = %gateway.base_url(), "evolution client ready");

    let prometheus = if config.prometheus.enabled {
        Some(PrometheusExporter::install()?)
    } else {
        info!("prometheus metrics disabled");
        None
    };

    let cancel = shutdown::install_signal_handler();

    let (sink, events) = ChannelSink::channel(config.supervisor.event_buffer);
    let hub = EventHub::new(config.supervisor.event_buffer);
    // Outlives `cancel` so that `service-stopped` still reaches subscribers.
    let drain_cancel = CancellationToken::new();
    let drain = hub.spawn_drain(events, drain_cancel.clone());

    let supervisor = if config.supervisor.enabled {
        let settings = SupervisorSettings::from_config(&config);
        info!(
            check_interval_secs = settings.check_interval.as_secs(),
            health_interval_secs = settings.health_interval.as_secs(),
            max_retries = settings.max_retries,
            "reconnection supervisor enabled"
        );
        let supervisor = Arc::new(Supervisor::new(
            registry.clone(),
            gateway.clone(),
            Arc::new(sink),
            settings,
        ));
        supervisor.initialize();
        Some(supervisor)
    } else {
        info!("reconnection supervisor disabled");
        drop(sink);
        None
    };

    let mut result = Ok(());

    if config.gateway.enabled {
        if config.gateway.bearer_token.is_none() {
            warn!("gateway.bearer_token is not set, all /v1 requests will be rejected");
        }
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let state = GatewayState {
            registry: registry.clone(),
            gateway: gateway.clone(),
            supervisor: supervisor.clone(),
            hub: hub.clone(),
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            health: HealthState::new(prometheus.map(|exporter| {
                Arc::new(move || exporter.render()) as Arc<dyn Fn() -> String + Send + Sync>
            })),
        };

        // Returns once `cancel` fires, or early if the listener fails.
        if let Err(e) = start_server(&server_config, state, cancel.clone()).await {
            error!(error = %e, "gateway server failed, shutting down");
            cancel.cancel();
            result = Err(e);
        }
    } else {
        info!("http gateway disabled");
        cancel.cancelled().await;
    }

    if let Some(supervisor) = &supervisor {
        supervisor.stop().await;
    }
    drain_cancel.cancel();
    if let Err(e) = drain.await {
        warn!(error = %e, "event drain task ended abnormally");
    }
    if let Err(e) = registry.close().await {
        warn!(error = %e, "failed to checkpoint registry on shutdown");
    }

    info!("evobridge serve shutdown complete");
    result
}
