// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Managed-Postgres flavor: OAuth database tokens instead of passwords.
//!
//! The database rejects long-lived passwords; every connection
//! authenticates with a short-lived token minted through workspace
//! credentials. One `ArcSwap` cell holds the current token. The pool
//! manager reads the cell on every new physical connection (tokens
//! expire, so capturing one at pool construction would strand the pool
//! after the first expiry), and a single background task is the only
//! writer, re-minting on a fixed interval until cancelled at shutdown.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use deadpool::managed::{Metrics, RecycleError, RecycleResult};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use strata_config::{PostgresSettings, WorkspaceSettings};
use strata_core::StrataError;
use strata_serving::ServingClient;

use crate::postgres::{PoolHandle, PostgresStorage, TokenRefreshHandle, storage_init};
use crate::pg;

/// Database tokens are minted for one hour; refresh ahead of expiry.
const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(50 * 60);

/// Mints short-lived database access tokens through the workspace.
#[derive(Clone)]
pub(crate) struct TokenMinter {
    serving: Arc<ServingClient>,
    instance_name: Option<String>,
}

impl TokenMinter {
    pub(crate) fn new(serving: Arc<ServingClient>, instance_name: Option<String>) -> Self {
        Self {
            serving,
            instance_name,
        }
    }

    /// Mint a fresh database token: an instance-scoped credential when
    /// an instance name is configured, otherwise the workspace
    /// service token itself.
    pub(crate) async fn mint(&self) -> Result<String, StrataError> {
        match &self.instance_name {
            Some(name) => self.serving.mint_database_credential(name).await,
            None => self.serving.service_token().await,
        }
    }
}

/// Pool manager that injects the current token as the password when a
/// new physical connection is opened.
pub struct TokenAuthManager {
    config: tokio_postgres::Config,
    token: Arc<ArcSwap<String>>,
}

impl deadpool::managed::Manager for TokenAuthManager {
    type Type = tokio_postgres::Client;
    type Error = tokio_postgres::Error;

    async fn create(&self) -> Result<tokio_postgres::Client, tokio_postgres::Error> {
        let mut config = self.config.clone();
        config.password(self.token.load().as_str());

        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "database connection terminated");
            }
        });
        Ok(client)
    }

    async fn recycle(
        &self,
        client: &mut tokio_postgres::Client,
        _: &Metrics,
    ) -> RecycleResult<tokio_postgres::Error> {
        if client.is_closed() {
            return Err(RecycleError::Message("connection closed".into()));
        }
        Ok(())
    }
}

/// Background task that re-mints the database token on a fixed
/// interval. Cancellation exits cleanly; any other failure is logged
/// and retried on the next cycle, never terminating the loop.
fn spawn_token_refresh(
    minter: TokenMinter,
    token: Arc<ArcSwap<String>>,
    cancel: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("token refresh loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match minter.mint().await {
                        Ok(fresh) => {
                            token.store(Arc::new(fresh));
                            info!("database access token refreshed");
                        }
                        Err(e) => {
                            warn!(error = %e, "database token refresh failed, retrying next cycle");
                        }
                    }
                }
            }
        }
    })
}

impl PostgresStorage {
    /// Connect to a managed Postgres instance using workspace OAuth.
    ///
    /// Mints the initial token, builds a pool whose connections read
    /// the live token cell, creates the schema, and starts the refresh
    /// loop. Any failure here surfaces as
    /// [`StrataError::StorageInit`] so the selector can fall back.
    pub async fn connect_managed(
        settings: &PostgresSettings,
        workspace: &WorkspaceSettings,
        serving: Arc<ServingClient>,
    ) -> Result<Self, StrataError> {
        let host = settings
            .host
            .as_deref()
            .ok_or_else(|| StrataError::ConfigurationMissing("postgres host".into()))?;
        let database = settings
            .database
            .as_deref()
            .ok_or_else(|| StrataError::ConfigurationMissing("postgres database".into()))?;
        // The OAuth client id doubles as the database role unless a
        // user is set explicitly.
        let user = settings
            .user
            .as_deref()
            .or(workspace.client_id.as_deref())
            .ok_or_else(|| StrataError::ConfigurationMissing("postgres user".into()))?;

        let minter = TokenMinter::new(serving.clone(), workspace.instance_name.clone());
        let initial = minter.mint().await?;
        let token = Arc::new(ArcSwap::from_pointee(initial));

        let mut config = tokio_postgres::Config::new();
        config
            .host(host)
            .port(settings.port)
            .dbname(database)
            .user(user)
            .application_name("strata");

        let manager = TokenAuthManager {
            config,
            token: token.clone(),
        };
        let pool: deadpool::managed::Pool<TokenAuthManager> =
            deadpool::managed::Pool::builder(manager)
                .max_size(settings.pool_size)
                .build()
                .map_err(storage_init)?;

        {
            let client = pool.get().await.map_err(storage_init)?;
            pg::create_schema(&client).await.map_err(storage_init)?;
        }
        info!(host, database, user, "managed postgres storage initialized");

        let cancel = CancellationToken::new();
        let task = spawn_token_refresh(minter, token, cancel.clone(), TOKEN_REFRESH_INTERVAL);

        Ok(PostgresStorage::from_parts(
            PoolHandle::TokenAuth(pool),
            serving,
            Some(TokenRefreshHandle {
                cancel,
                task: Mutex::new(Some(task)),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn serving_for(base: &str, instance: Option<&str>) -> (Arc<ServingClient>, TokenMinter) {
        let serving = Arc::new(
            ServingClient::new(&WorkspaceSettings {
                host: Some(base.to_string()),
                token: Some("workspace-token".into()),
                instance_name: instance.map(str::to_string),
                ..Default::default()
            })
            .unwrap(),
        );
        let minter = TokenMinter::new(serving.clone(), instance.map(str::to_string));
        (serving, minter)
    }

    #[tokio::test]
    async fn minter_without_instance_uses_the_service_token() {
        let (_, minter) = serving_for("https://example.cloud", None);
        // No network: the static workspace token is returned directly.
        assert_eq!(minter.mint().await.unwrap(), "workspace-token");
    }

    #[tokio::test]
    async fn minter_with_instance_mints_a_database_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/database/credentials"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "db-tok"})),
            )
            .mount(&server)
            .await;

        let (_, minter) = serving_for(&server.uri(), Some("chat-db"));
        assert_eq!(minter.mint().await.unwrap(), "db-tok");
    }

    #[tokio::test]
    async fn refresh_loop_updates_the_shared_token_cell() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/database/credentials"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token": "refreshed"})),
            )
            .mount(&server)
            .await;

        let (_, minter) = serving_for(&server.uri(), Some("chat-db"));
        let token = Arc::new(ArcSwap::from_pointee("initial".to_string()));
        let cancel = CancellationToken::new();
        let task = spawn_token_refresh(
            minter,
            token.clone(),
            cancel.clone(),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(token.load().as_str(), "refreshed");

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn refresh_loop_survives_minting_failures() {
        let server = MockServer::start().await;
        // First attempt fails; subsequent attempts succeed.
        Mock::given(method("POST"))
            .and(path("/api/2.0/database/credentials"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/database/credentials"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token": "second-try"})),
            )
            .mount(&server)
            .await;

        let (_, minter) = serving_for(&server.uri(), Some("chat-db"));
        let token = Arc::new(ArcSwap::from_pointee("initial".to_string()));
        let cancel = CancellationToken::new();
        let task = spawn_token_refresh(
            minter,
            token.clone(),
            cancel.clone(),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(token.load().as_str(), "second-try");

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_loop_exits_without_another_mint() {
        let (_, minter) = serving_for("https://example.cloud", None);
        let token = Arc::new(ArcSwap::from_pointee("initial".to_string()));
        let cancel = CancellationToken::new();
        let task = spawn_token_refresh(
            minter,
            token.clone(),
            cancel.clone(),
            Duration::from_secs(3600),
        );

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(token.load().as_str(), "initial");
    }
}
