// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution API implementation of the session gateway.
//!
//! [`EvolutionClient`] talks to the Evolution REST API with the `apikey`
//! header and maps its responses onto the [`SessionGateway`] contract.
//!
//! [`SessionGateway`]: evobridge_core::SessionGateway

pub mod client;
pub mod qr;
pub mod types;

pub use client::EvolutionClient;
