// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the registry tables.

pub mod instances;
pub mod metrics;
