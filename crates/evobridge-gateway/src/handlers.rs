// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the operator API.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use evobridge_core::{
    HealthStatus, Instance, InstanceKey, InstanceStatus, ReconnectPayload, SlotPosition, TenantId,
};
use evobridge_supervisor::ServiceStats;

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub database: HealthStatus,
}

#[derive(Debug, Deserialize)]
pub struct InstanceFilter {
    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InstanceListResponse {
    pub instances: Vec<Instance>,
}

#[derive(Debug, Serialize)]
pub struct OffboardResponse {
    pub tenant_id: TenantId,
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub instance: String,
    pub status: InstanceStatus,
    /// QR image as a data URL, present when a pairing QR was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}

/// GET /health
///
/// Public liveness probe. Returns 503 when the registry does not answer.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let database = state.registry.health_check().await;
    let healthy = database.is_healthy();
    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        database,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

/// GET /v1/instances[?tenant=]
pub async fn list_instances(
    State(state): State<GatewayState>,
    Query(filter): Query<InstanceFilter>,
) -> Result<Json<InstanceListResponse>, ApiError> {
    let tenant = filter.tenant.map(TenantId::new);
    let instances = state.registry.list_instances(tenant.as_ref()).await?;
    Ok(Json(InstanceListResponse { instances }))
}

/// GET /v1/supervisor
pub async fn get_supervisor(
    State(state): State<GatewayState>,
) -> Result<Json<ServiceStats>, ApiError> {
    let supervisor = state
        .supervisor
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "supervisor disabled"))?;
    Ok(Json(supervisor.stats()))
}

/// POST /v1/tenants/{tenant}
///
/// Creates the tenant's five `inactive` slots. Idempotent.
pub async fn provision_tenant(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> Result<(StatusCode, Json<InstanceListResponse>), ApiError> {
    let tenant = parse_tenant(&tenant)?;
    let instances = state.registry.provision_tenant(&tenant).await?;
    tracing::info!(tenant_id = %tenant, "tenant provisioned");
    Ok((StatusCode::CREATED, Json(InstanceListResponse { instances })))
}

/// DELETE /v1/tenants/{tenant}
///
/// Deletes the tenant's gateway sessions (best effort), then its rows.
pub async fn offboard_tenant(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> Result<Json<OffboardResponse>, ApiError> {
    let tenant = parse_tenant(&tenant)?;
    let instances = state.registry.list_instances(Some(&tenant)).await?;
    for instance in instances.iter().filter(|i| i.status != InstanceStatus::Inactive) {
        if let Err(e) = state.gateway.delete_session(&instance.session_name).await {
            tracing::warn!(
                instance = %instance.session_name,
                error = %e,
                "failed to delete gateway session during offboarding"
            );
        }
    }
    let removed = state.registry.remove_tenant(&tenant).await?;
    tracing::info!(tenant_id = %tenant, removed, "tenant offboarded");
    Ok(Json(OffboardResponse {
        tenant_id: tenant,
        removed,
    }))
}

/// POST /v1/instances/{tenant}/{slot}/connect
///
/// Requests a pairing QR. Creates the gateway session first when the
/// gateway does not know it.
pub async fn connect_instance(
    State(state): State<GatewayState>,
    Path((tenant, slot)): Path<(String, u8)>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let instance = lookup(&state, &tenant, slot).await?;
    let session = instance.session_name.as_str();

    if state.gateway.connection_state(session).await.not_found {
        state.gateway.create_session(session).await?;
    }

    match state.gateway.request_reconnect(session).await? {
        Some(ReconnectPayload::Qr { data_url, .. }) => {
            state.registry.mark_qr_pending(&instance.key, &data_url).await?;
            tracing::info!(instance = %session, "pairing QR issued");
            Ok(Json(ConnectResponse {
                instance: instance.session_name.clone(),
                status: InstanceStatus::QrPending,
                qr: Some(data_url),
            }))
        }
        Some(ReconnectPayload::Resumed) => {
            state.registry.mark_healthy(&instance.key, None).await?;
            tracing::info!(instance = %session, "session already open");
            Ok(Json(ConnectResponse {
                instance: instance.session_name.clone(),
                status: InstanceStatus::Connected,
                qr: None,
            }))
        }
        None => Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            format!("gateway issued no QR for {session}"),
        )),
    }
}

/// POST /v1/instances/{tenant}/{slot}/disconnect
pub async fn disconnect_instance(
    State(state): State<GatewayState>,
    Path((tenant, slot)): Path<(String, u8)>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let instance = lookup(&state, &tenant, slot).await?;
    state.gateway.logout(&instance.session_name).await?;
    state.registry.mark_disconnected(&instance.key).await?;
    tracing::info!(instance = %instance.session_name, "instance disconnected by user");
    Ok(Json(ConnectResponse {
        instance: instance.session_name,
        status: InstanceStatus::Disconnected,
        qr: None,
    }))
}

async fn lookup(state: &GatewayState, tenant: &str, slot: u8) -> Result<Instance, ApiError> {
    let key = InstanceKey::new(parse_tenant(tenant)?, SlotPosition::new(slot)?);
    state
        .registry
        .get_instance(&key)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("instance not found: {key}")))
}

fn parse_tenant(raw: &str) -> Result<TenantId, ApiError> {
    if TenantId::is_valid(raw) {
        Ok(TenantId::new(raw))
    } else {
        Err(ApiError::bad_request(format!("invalid tenant id `{raw}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tenant_is_bad_request() {
        assert!(parse_tenant("acme-corp_2").is_ok());
        let err = parse_tenant("x_wa_1").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn connect_response_omits_missing_qr() {
        let json = serde_json::to_value(ConnectResponse {
            instance: "T1_wa_1".into(),
            status: InstanceStatus::Disconnected,
            qr: None,
        })
        .unwrap();
        assert_eq!(json["status"], "disconnected");
        assert!(json.get("qr").is_none());
    }
}
