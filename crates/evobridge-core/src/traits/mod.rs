// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits injected into the supervisor.
//!
//! All async traits use `#[async_trait]` so they can be held as
//! `Arc<dyn Trait>`.

pub mod gateway;
pub mod registry;
pub mod sink;

pub use gateway::SessionGateway;
pub use registry::InstanceRegistry;
pub use sink::NotificationSink;
