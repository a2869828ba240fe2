// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup backend selection with ordered fallback.
//!
//! Selection is a pure, first-match-wins decision over the
//! configuration struct, made once at process start and never
//! re-probed. A backend whose configuration is present but whose
//! initialization fails is logged and skipped, not fatal; the
//! in-memory backend closes the chain and cannot fail.

use std::sync::Arc;

use tracing::{info, warn};

use strata_config::StrataConfig;
use strata_core::{Storage, StrataError};
use strata_serving::ServingClient;

use crate::memory::MemoryStorage;
use crate::postgres::PostgresStorage;
use crate::warehouse::WarehouseStorage;

/// The storage backends, in selection-preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    /// Postgres authenticated with minted OAuth tokens.
    ManagedPostgres,
    /// Postgres authenticated with a static password.
    Postgres,
    /// SQL warehouse over the statement REST API.
    Warehouse,
    /// Volatile in-memory fallback.
    Memory,
}

/// Decide which backend the configuration selects, first match wins.
pub fn choose_backend(config: &StrataConfig) -> BackendChoice {
    candidate_backends(config)
        .first()
        .copied()
        .unwrap_or(BackendChoice::Memory)
}

/// Every backend whose configuration is present, in preference order.
/// Memory always closes the list.
fn candidate_backends(config: &StrataConfig) -> Vec<BackendChoice> {
    let pg = &config.postgres;
    let ws = &config.workspace;
    let wh = &config.warehouse;

    let mut candidates = Vec::new();
    if pg.host.is_some() && pg.database.is_some() && ws.host.is_some() && ws.has_client_credentials()
    {
        candidates.push(BackendChoice::ManagedPostgres);
    }
    if pg.host.is_some() && pg.database.is_some() && pg.user.is_some() {
        candidates.push(BackendChoice::Postgres);
    }
    if wh.http_path.is_some() && ws.is_configured() {
        candidates.push(BackendChoice::Warehouse);
    }
    candidates.push(BackendChoice::Memory);
    candidates
}

async fn build_backend(
    choice: BackendChoice,
    config: &StrataConfig,
    serving: Arc<ServingClient>,
) -> Result<Arc<dyn Storage>, StrataError> {
    match choice {
        BackendChoice::ManagedPostgres => {
            let storage =
                PostgresStorage::connect_managed(&config.postgres, &config.workspace, serving)
                    .await?;
            Ok(Arc::new(storage))
        }
        BackendChoice::Postgres => {
            let storage = PostgresStorage::connect(&config.postgres, serving).await?;
            Ok(Arc::new(storage))
        }
        BackendChoice::Warehouse => {
            let storage =
                WarehouseStorage::connect(&config.workspace, &config.warehouse, serving).await?;
            Ok(Arc::new(storage))
        }
        BackendChoice::Memory => Ok(Arc::new(MemoryStorage::new(serving))),
    }
}

/// Initialize storage for the process: walk the candidate backends in
/// order, keep the first that comes up, then let live remote data
/// override the seeded endpoints once.
pub async fn initialize_storage(
    config: &StrataConfig,
    serving: Arc<ServingClient>,
) -> Arc<dyn Storage> {
    for choice in candidate_backends(config) {
        match build_backend(choice, config, serving.clone()).await {
            Ok(storage) => {
                info!(backend = ?choice, "storage backend ready");
                if let Err(e) = storage.refresh_endpoints_from_remote().await {
                    // The refresh contract reports failures instead of
                    // raising; anything surfacing here is unexpected.
                    warn!(error = %e, "initial endpoint refresh errored");
                }
                return storage;
            }
            Err(e) => {
                warn!(backend = ?choice, error = %e, "storage backend failed to initialize, falling back");
            }
        }
    }

    // candidate_backends always ends with Memory, which cannot fail.
    Arc::new(MemoryStorage::new(serving))
}
