// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./evobridge.toml` > `~/.config/evobridge/evobridge.toml`
//! > `/etc/evobridge/evobridge.toml`, with environment variable overrides via
//! the `EVOBRIDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::EvobridgeConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/evobridge/evobridge.toml";
pub(crate) const LOCAL_CONFIG_FILE: &str = "evobridge.toml";

/// Config sections that env keys are split on. Keys inside a section may
/// themselves contain underscores (`EVOBRIDGE_EVOLUTION_API_KEY`).
const SECTIONS: &[&str] = &[
    "service",
    "evolution",
    "storage",
    "supervisor",
    "gateway",
    "prometheus",
];

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("evobridge").join(LOCAL_CONFIG_FILE))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/evobridge/evobridge.toml` (system-wide)
/// 3. `~/.config/evobridge/evobridge.toml` (user XDG config)
/// 4. `./evobridge.toml` (local directory)
/// 5. `EVOBRIDGE_*` environment variables
pub fn load_config() -> Result<EvobridgeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults only.
///
/// Used for testing.
pub fn load_config_from_str(toml_content: &str) -> Result<EvobridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EvobridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EvobridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EvobridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(EvobridgeConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Uses `Env::map()` rather than `Env::split("_")` so that
/// `EVOBRIDGE_SUPERVISOR_MAX_RETRIES` maps to `supervisor.max_retries`,
/// not `supervisor.max.retries`.
fn env_provider() -> Env {
    Env::prefixed("EVOBRIDGE_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
