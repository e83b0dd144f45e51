// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Evobridge workspace.

use thiserror::Error;

/// The primary error type used across collaborator traits and the supervisor.
#[derive(Debug, Error)]
pub enum EvobridgeError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Registry backend errors (database connection, query failure, row decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Session gateway errors (HTTP failure, unexpected status, malformed body).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No instance row exists for the requested key or session name.
    #[error("instance not found: {key}")]
    InstanceNotFound { key: String },

    /// Slot position outside the allowed `1..=5` range.
    #[error("invalid slot position {0}: must be between 1 and {max}", max = crate::types::MAX_SLOTS)]
    InvalidSlot(u8),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvobridgeError {
    /// Shorthand for a gateway error without an underlying source.
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for failures that are expected to clear on their own
    /// (timeouts, gateway transport hiccups).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Gateway { .. })
    }
}
