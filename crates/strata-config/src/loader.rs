// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered merging.
//!
//! Merge order: compiled defaults, then `strata.toml` in the working
//! directory, then `STRATA_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::StrataConfig;

/// Load configuration from `strata.toml` with env var overrides.
pub fn load_config() -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::file("strata.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no env lookup). Used by
/// tests and explicit config injection.
pub fn load_config_from_str(toml_content: &str) -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Environment provider using explicit `map()` for section-to-dot
/// mapping. `Env::split("_")` would misparse underscore-containing key
/// names: `STRATA_WORKSPACE_CLIENT_ID` must become
/// `workspace.client_id`, not `workspace.client.id`.
fn env_provider() -> Env {
    Env::prefixed("STRATA_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("workspace_", "workspace.", 1)
            .replacen("postgres_", "postgres.", 1)
            .replacen("warehouse_", "warehouse.", 1);
        mapped.into()
    })
}
