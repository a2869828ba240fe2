// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server startup and shutdown wiring.
//!
//! Startup order matters: storage selection happens once, then the
//! chosen backend gets a single chance to pull live endpoints from the
//! workspace before the listener accepts traffic. Shutdown drains the
//! backend (cancels the token refresh loop, releases pools) after the
//! listener stops.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use strata_config::StrataConfig;
use strata_gateway::AppState;
use strata_serving::ServingClient;
use strata_storage::{choose_backend, initialize_storage};

pub async fn run(config: StrataConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let serving = Arc::new(ServingClient::new(&config.workspace)?);
    if !serving.is_configured() {
        info!("workspace not configured; chat will use canned responses");
    }

    info!(backend = ?choose_backend(&config), "selecting storage backend");
    let storage = initialize_storage(&config, serving.clone()).await;

    let state = AppState {
        storage: storage.clone(),
        serving,
        dev_user: config.server.dev_user,
    };

    strata_gateway::start_server(&config.server, state, shutdown_signal()).await?;

    if let Err(e) = storage.shutdown().await {
        warn!(error = %e, "storage shutdown reported an error");
    }
    info!("strata stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
}
