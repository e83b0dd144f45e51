// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for Evobridge collaborator traits.
//!
//! Deterministic, in-process stand-ins for the registry, the session
//! gateway and the notification sink, so supervisor behaviour can be tested
//! without SQLite or a live Evolution API.
//!
//! # Components
//!
//! - [`MemoryRegistry`] - in-memory `InstanceRegistry` with a failure switch
//! - [`MockGateway`] - scripted `SessionGateway` with a call log
//! - [`RecordingSink`] - `NotificationSink` that keeps every event

pub mod memory_registry;
pub mod mock_gateway;
pub mod recording_sink;

pub use memory_registry::{MemoryRegistry, instance_with};
pub use mock_gateway::{GatewayCall, MockGateway, ReconnectOutcome};
pub use recording_sink::RecordingSink;
