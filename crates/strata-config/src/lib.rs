// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Strata backend.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_str};
pub use model::{
    PostgresSettings, ServerSettings, StrataConfig, WarehouseSettings, WorkspaceSettings,
};
