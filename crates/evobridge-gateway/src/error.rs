// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use evobridge_core::EvobridgeError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error returned by a handler, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<EvobridgeError> for ApiError {
    fn from(err: EvobridgeError) -> Self {
        let status = match &err {
            EvobridgeError::InstanceNotFound { .. } => StatusCode::NOT_FOUND,
            EvobridgeError::InvalidSlot(_) => StatusCode::BAD_REQUEST,
            EvobridgeError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            EvobridgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            EvobridgeError::Config(_)
            | EvobridgeError::Storage { .. }
            | EvobridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
