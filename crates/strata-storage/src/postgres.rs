// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Postgres storage backend.
//!
//! One struct serves both Postgres flavors: [`PostgresStorage::connect`]
//! authenticates with a static password, while the managed constructor
//! in [`crate::managed`] swaps in a token-injecting pool and a
//! background credential refresh loop. Conversations and messages are
//! durable; reference data lives in the in-memory cache either way.

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{ManagerConfig, PoolConfig, RecyclingMethod, Runtime};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use strata_config::PostgresSettings;
use strata_core::{
    AppConfig, Conversation, ConversationUpdate, Domain, DomainUpdate, Endpoint,
    EndpointUpdate, InsertDomain, InsertEndpoint, InsertMessage, Message, Site, Storage,
    StrataError,
};
use strata_serving::ServingClient;

use crate::cache::{ReferenceCache, refresh_endpoints};
use crate::managed::TokenAuthManager;
use crate::now_millis;
use crate::pg;

/// Durable conversation storage over Postgres.
pub struct PostgresStorage {
    pool: PoolHandle,
    serving: Arc<ServingClient>,
    reference: ReferenceCache,
    token_refresh: Option<TokenRefreshHandle>,
}

/// Connection pool, either password-authenticated or token-injecting.
pub(crate) enum PoolHandle {
    Static(deadpool_postgres::Pool),
    TokenAuth(deadpool::managed::Pool<TokenAuthManager>),
}

/// A checked-out connection from either pool flavor.
pub(crate) enum PooledClient {
    Static(deadpool_postgres::Object),
    TokenAuth(deadpool::managed::Object<TokenAuthManager>),
}

impl std::ops::Deref for PooledClient {
    type Target = tokio_postgres::Client;

    fn deref(&self) -> &tokio_postgres::Client {
        match self {
            PooledClient::Static(obj) => obj,
            PooledClient::TokenAuth(obj) => obj,
        }
    }
}

impl PoolHandle {
    pub(crate) async fn get(&self) -> Result<PooledClient, StrataError> {
        match self {
            PoolHandle::Static(pool) => {
                pool.get().await.map(PooledClient::Static).map_err(map_pool_err)
            }
            PoolHandle::TokenAuth(pool) => pool
                .get()
                .await
                .map(PooledClient::TokenAuth)
                .map_err(map_pool_err),
        }
    }

    fn close(&self) {
        match self {
            PoolHandle::Static(pool) => pool.close(),
            PoolHandle::TokenAuth(pool) => pool.close(),
        }
    }
}

/// Shutdown handle for the managed backend's credential refresh loop.
pub(crate) struct TokenRefreshHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: Mutex<Option<JoinHandle<()>>>,
}

impl PostgresStorage {
    /// Connect with static password authentication, create the schema
    /// if absent, and seed the reference cache.
    pub async fn connect(
        settings: &PostgresSettings,
        serving: Arc<ServingClient>,
    ) -> Result<Self, StrataError> {
        let host = require(settings.host.as_deref(), "postgres host")?;
        let database = require(settings.database.as_deref(), "postgres database")?;
        let user = require(settings.user.as_deref(), "postgres user")?;

        let mut config = deadpool_postgres::Config::new();
        config.host = Some(host.to_string());
        config.port = Some(settings.port);
        config.dbname = Some(database.to_string());
        config.user = Some(user.to_string());
        config.password = settings.password.clone();
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        config.pool = Some(PoolConfig::new(settings.pool_size));

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(storage_init)?;

        let client = pool.get().await.map_err(storage_init)?;
        pg::create_schema(&client).await.map_err(storage_init)?;
        drop(client);
        info!(host, database, "postgres storage initialized");

        Ok(Self {
            pool: PoolHandle::Static(pool),
            serving,
            reference: ReferenceCache::seeded(),
            token_refresh: None,
        })
    }

    pub(crate) fn from_parts(
        pool: PoolHandle,
        serving: Arc<ServingClient>,
        token_refresh: Option<TokenRefreshHandle>,
    ) -> Self {
        Self {
            pool,
            serving,
            reference: ReferenceCache::seeded(),
            token_refresh,
        }
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn refresh_endpoints_from_remote(&self) -> Result<Vec<Endpoint>, StrataError> {
        refresh_endpoints(&self.reference, &self.serving).await
    }

    async fn get_conversations(
        &self,
        user_email: Option<&str>,
    ) -> Result<Vec<Conversation>, StrataError> {
        let client = self.pool.get().await?;
        pg::list_conversations(&client, user_email).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StrataError> {
        let client = self.pool.get().await?;
        pg::get_conversation(&client, id).await
    }

    async fn create_conversation(
        &self,
        endpoint_id: &str,
        title: &str,
        domain_id: Option<&str>,
        site_id: Option<&str>,
        user_email: Option<&str>,
    ) -> Result<Conversation, StrataError> {
        let now = now_millis();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            messages: Vec::new(),
            endpoint_id: endpoint_id.to_string(),
            domain_id: domain_id.map(str::to_string),
            site_id: site_id.map(str::to_string),
            user_email: user_email.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        let client = self.pool.get().await?;
        pg::insert_conversation(&client, &conversation).await?;
        Ok(conversation)
    }

    async fn add_message(
        &self,
        conversation_id: &str,
        message: InsertMessage,
    ) -> Result<Message, StrataError> {
        let client = self.pool.get().await?;
        if !pg::conversation_exists(&client, conversation_id).await? {
            return Err(StrataError::not_found("conversation", conversation_id));
        }

        let stored = Message {
            id: Uuid::new_v4().to_string(),
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        };
        pg::insert_message(&client, conversation_id, &stored, now_millis()).await?;
        Ok(stored)
    }

    async fn update_conversation(
        &self,
        id: &str,
        updates: ConversationUpdate,
    ) -> Result<Option<Conversation>, StrataError> {
        let client = self.pool.get().await?;
        if !pg::conversation_exists(&client, id).await? {
            return Ok(None);
        }
        pg::apply_conversation_update(&client, id, &updates, now_millis()).await?;
        pg::get_conversation(&client, id).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, StrataError> {
        let client = self.pool.get().await?;
        pg::delete_conversation(&client, id).await
    }

    async fn get_domains(&self) -> Result<Vec<Domain>, StrataError> {
        Ok(self.reference.domains().await)
    }

    async fn get_domain(&self, id: &str) -> Result<Option<Domain>, StrataError> {
        Ok(self.reference.domain(id).await)
    }

    async fn create_domain(&self, domain: InsertDomain) -> Result<Domain, StrataError> {
        Ok(self.reference.insert_domain(domain).await)
    }

    async fn update_domain(
        &self,
        id: &str,
        updates: DomainUpdate,
    ) -> Result<Option<Domain>, StrataError> {
        Ok(self.reference.update_domain(id, updates).await)
    }

    async fn delete_domain(&self, id: &str) -> Result<bool, StrataError> {
        Ok(self.reference.remove_domain(id).await)
    }

    async fn get_sites(&self) -> Result<Vec<Site>, StrataError> {
        Ok(self.reference.sites().await)
    }

    async fn get_site(&self, id: &str) -> Result<Option<Site>, StrataError> {
        Ok(self.reference.site(id).await)
    }

    async fn get_endpoints(&self, domain_id: Option<&str>) -> Result<Vec<Endpoint>, StrataError> {
        Ok(self.reference.endpoints_visible(domain_id).await)
    }

    async fn get_endpoint(&self, id: &str) -> Result<Option<Endpoint>, StrataError> {
        Ok(self.reference.endpoint(id).await)
    }

    async fn create_endpoint(&self, endpoint: InsertEndpoint) -> Result<Endpoint, StrataError> {
        Ok(self.reference.insert_endpoint(endpoint).await)
    }

    async fn update_endpoint(
        &self,
        id: &str,
        updates: EndpointUpdate,
    ) -> Result<Option<Endpoint>, StrataError> {
        Ok(self.reference.update_endpoint(id, updates).await)
    }

    async fn delete_endpoint(&self, id: &str) -> Result<bool, StrataError> {
        Ok(self.reference.remove_endpoint(id).await)
    }

    async fn get_config(&self) -> Result<AppConfig, StrataError> {
        Ok(self.reference.config().await)
    }

    async fn set_config(&self, config: AppConfig) -> Result<AppConfig, StrataError> {
        Ok(self.reference.set_config(config).await)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        if let Some(handle) = &self.token_refresh {
            handle.cancel.cancel();
            if let Some(task) = handle.task.lock().await.take() {
                let _ = task.await;
            }
            debug!("token refresh loop stopped");
        }
        self.pool.close();
        Ok(())
    }
}

fn require<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str, StrataError> {
    value.ok_or_else(|| StrataError::ConfigurationMissing(what.to_string()))
}

pub(crate) fn storage_init(e: impl std::error::Error + Send + Sync + 'static) -> StrataError {
    StrataError::StorageInit {
        source: Box::new(e),
    }
}

fn map_pool_err(e: deadpool::managed::PoolError<tokio_postgres::Error>) -> StrataError {
    StrataError::Storage {
        operation: "acquire_connection",
        source: Box::new(e),
    }
}
