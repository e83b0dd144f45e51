// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket surface of Evobridge.
//!
//! - [`ChannelSink`]: the supervisor's notification sink, a bounded queue;
//! - [`EventHub`]: drains that queue and fans events out to `/ws` clients;
//! - [`router`]: operator REST API, Evolution webhook, health and metrics.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod server;
pub mod sink;
pub mod webhook;
pub mod ws;

pub use auth::AuthConfig;
pub use hub::EventHub;
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
pub use sink::{ChannelSink, DEFAULT_EVENT_BUFFER};
