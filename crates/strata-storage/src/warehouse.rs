// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQL-warehouse storage backend.
//!
//! Speaks the warehouse's SQL statement REST API over HTTP. Unlike the
//! Postgres backends, this one also persists domains, sites,
//! endpoints, and the app config durably; the in-memory cache is a
//! write-through front. Every value binds as a named statement
//! parameter, ids included.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use strata_config::{WarehouseSettings, WorkspaceSettings};
use strata_core::{
    AppConfig, Conversation, ConversationUpdate, Domain, DomainUpdate, Endpoint,
    EndpointType, EndpointUpdate, InsertDomain, InsertEndpoint, InsertMessage, Message,
    Site, Storage, StrataError,
};
use strata_serving::ServingClient;

use crate::cache::{ReferenceCache, refresh_endpoints};
use crate::now_millis;
use crate::pg::parse_role;
use crate::postgres::storage_init;
use crate::seed;

/// Singleton key for the durable app config row.
const CONFIG_ROW_ID: &str = "default";

/// A named parameter bound into a warehouse statement.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatementParam {
    name: &'static str,
    value: Option<String>,
    #[serde(rename = "type")]
    ty: &'static str,
}

impl StatementParam {
    fn text(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: Some(value.into()),
            ty: "STRING",
        }
    }

    fn opt_text(name: &'static str, value: Option<&str>) -> Self {
        Self {
            name,
            value: value.map(str::to_string),
            ty: "STRING",
        }
    }

    fn long(name: &'static str, value: i64) -> Self {
        Self {
            name,
            value: Some(value.to_string()),
            ty: "BIGINT",
        }
    }

    fn boolean(name: &'static str, value: bool) -> Self {
        Self {
            name,
            value: Some(value.to_string()),
            ty: "BOOLEAN",
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    status: StatementStatus,
    #[serde(default)]
    result: Option<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<StatementErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StatementErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
}

/// Minimal client for the synchronous statement execution API.
pub(crate) struct StatementClient {
    http: reqwest::Client,
    base_url: String,
    warehouse_id: String,
    catalog: String,
    schema: String,
    serving: Arc<ServingClient>,
}

impl StatementClient {
    pub(crate) fn new(
        base_url: String,
        warehouse_id: String,
        catalog: String,
        schema: String,
        serving: Arc<ServingClient>,
    ) -> Result<Self, StrataError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StrataError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            warehouse_id,
            catalog,
            schema,
            serving,
        })
    }

    /// Execute one statement synchronously and return its rows (cells
    /// arrive stringly typed; `None` is SQL NULL).
    pub(crate) async fn execute(
        &self,
        statement: &str,
        parameters: Vec<StatementParam>,
    ) -> Result<Vec<Vec<Option<String>>>, StrataError> {
        let token = self.serving.service_token().await?;

        let response = self
            .http
            .post(format!("{}/api/2.0/sql/statements", self.base_url))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "statement": statement,
                "warehouse_id": self.warehouse_id,
                "catalog": self.catalog,
                "schema": self.schema,
                "wait_timeout": "30s",
                "on_wait_timeout": "CANCEL",
                "parameters": parameters,
            }))
            .send()
            .await
            .map_err(|e| statement_err("statement request failed", Some(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(statement_err::<reqwest::Error>(
                &format!("statement API returned {status}"),
                None,
            ));
        }

        let body: StatementResponse = response
            .json()
            .await
            .map_err(|e| statement_err("statement API returned unusable body", Some(e)))?;

        if body.status.state != "SUCCEEDED" {
            let detail = body
                .status
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(statement_err::<reqwest::Error>(
                &format!("statement finished as {}: {detail}", body.status.state),
                None,
            ));
        }

        Ok(body.result.map(|r| r.data_array).unwrap_or_default())
    }
}

fn statement_err<E: std::error::Error + Send + Sync + 'static>(
    message: &str,
    source: Option<E>,
) -> StrataError {
    StrataError::Storage {
        operation: "warehouse_statement",
        source: source
            .map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            .unwrap_or_else(|| message.to_string().into()),
    }
}

/// Warehouse-backed storage with durable reference data.
pub struct WarehouseStorage {
    sql: StatementClient,
    serving: Arc<ServingClient>,
    reference: ReferenceCache,
}

impl WarehouseStorage {
    /// Connect to the warehouse, create tables if absent, load the
    /// reference cache from them, and seed defaults into empty tables.
    pub async fn connect(
        workspace: &WorkspaceSettings,
        warehouse: &WarehouseSettings,
        serving: Arc<ServingClient>,
    ) -> Result<Self, StrataError> {
        let base_url = workspace
            .base_url()
            .ok_or_else(|| StrataError::ConfigurationMissing("workspace host".into()))?;
        let warehouse_id = warehouse
            .warehouse_id()
            .ok_or_else(|| StrataError::ConfigurationMissing("warehouse http path".into()))?;

        let sql = StatementClient::new(
            base_url,
            warehouse_id.to_string(),
            warehouse.catalog.clone(),
            warehouse.schema.clone(),
            serving.clone(),
        )?;

        let storage = Self {
            sql,
            serving,
            reference: ReferenceCache::empty(),
        };
        storage.create_tables().await.map_err(storage_init)?;
        storage.load_reference().await.map_err(storage_init)?;
        info!(warehouse_id, "warehouse storage initialized");
        Ok(storage)
    }

    async fn create_tables(&self) -> Result<(), StrataError> {
        let tables = [
            "CREATE TABLE IF NOT EXISTS conversations (
                id STRING, title STRING, endpoint_id STRING, domain_id STRING,
                site_id STRING, user_email STRING, created_at BIGINT, updated_at BIGINT)",
            "CREATE TABLE IF NOT EXISTS messages (
                id STRING, conversation_id STRING, role STRING, content STRING, timestamp BIGINT)",
            "CREATE TABLE IF NOT EXISTS domains (
                id STRING, name STRING, description STRING, system_prompt STRING, icon STRING)",
            "CREATE TABLE IF NOT EXISTS sites (
                id STRING, name STRING, location STRING, type STRING)",
            "CREATE TABLE IF NOT EXISTS endpoints (
                id STRING, name STRING, description STRING, type STRING,
                is_default BOOLEAN, domain_id STRING)",
            "CREATE TABLE IF NOT EXISTS user_config (
                user_id STRING, default_endpoint_id STRING, default_domain_id STRING,
                default_site_id STRING, system_prompt STRING)",
        ];
        for ddl in tables {
            self.sql.execute(ddl, Vec::new()).await?;
        }
        Ok(())
    }

    /// Populate the cache from the durable tables, seeding defaults
    /// when the domain table is empty (first boot).
    async fn load_reference(&self) -> Result<(), StrataError> {
        let domain_rows = self
            .sql
            .execute(
                "SELECT id, name, description, system_prompt, icon FROM domains",
                Vec::new(),
            )
            .await?;

        if domain_rows.is_empty() {
            self.seed_reference().await?;
            return Ok(());
        }

        let domains = domain_rows
            .into_iter()
            .map(parse_domain_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.reference.set_domains(domains).await;

        let sites = self
            .sql
            .execute("SELECT id, name, location, type FROM sites", Vec::new())
            .await?
            .into_iter()
            .map(parse_site_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.reference.set_sites(sites).await;

        let endpoints = self
            .sql
            .execute(
                "SELECT id, name, description, type, is_default, domain_id FROM endpoints",
                Vec::new(),
            )
            .await?
            .into_iter()
            .map(parse_endpoint_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.reference.replace_endpoints(endpoints).await;

        let config_rows = self
            .sql
            .execute(
                "SELECT default_endpoint_id, default_domain_id, default_site_id, system_prompt
                 FROM user_config WHERE user_id = :user_id",
                vec![StatementParam::text("user_id", CONFIG_ROW_ID)],
            )
            .await?;
        if let Some(row) = config_rows.into_iter().next() {
            self.reference.set_config(parse_config_row(row)).await;
        }

        Ok(())
    }

    async fn seed_reference(&self) -> Result<(), StrataError> {
        for domain in seed::default_domains() {
            self.write_domain(&domain).await?;
        }
        self.reference.set_domains(seed::default_domains()).await;

        for site in seed::default_sites() {
            self.sql
                .execute(
                    "INSERT INTO sites VALUES (:id, :name, :location, :type)",
                    vec![
                        StatementParam::text("id", &site.id),
                        StatementParam::text("name", &site.name),
                        StatementParam::text("location", &site.location),
                        StatementParam::text("type", &site.kind),
                    ],
                )
                .await?;
        }
        self.reference.set_sites(seed::default_sites()).await;

        for endpoint in seed::default_endpoints() {
            self.write_endpoint(&endpoint).await?;
        }
        self.reference
            .replace_endpoints(seed::default_endpoints())
            .await;

        info!("warehouse reference tables seeded with defaults");
        Ok(())
    }

    async fn write_domain(&self, domain: &Domain) -> Result<(), StrataError> {
        self.sql
            .execute(
                "INSERT INTO domains VALUES (:id, :name, :description, :system_prompt, :icon)",
                vec![
                    StatementParam::text("id", &domain.id),
                    StatementParam::text("name", &domain.name),
                    StatementParam::text("description", &domain.description),
                    StatementParam::text("system_prompt", &domain.system_prompt),
                    StatementParam::opt_text("icon", domain.icon.as_deref()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn write_endpoint(&self, endpoint: &Endpoint) -> Result<(), StrataError> {
        self.sql
            .execute(
                "INSERT INTO endpoints VALUES (:id, :name, :description, :type, :is_default, :domain_id)",
                vec![
                    StatementParam::text("id", &endpoint.id),
                    StatementParam::text("name", &endpoint.name),
                    StatementParam::text("description", &endpoint.description),
                    StatementParam::text("type", endpoint.endpoint_type.to_string()),
                    StatementParam::boolean("is_default", endpoint.is_default),
                    StatementParam::opt_text("domain_id", endpoint.domain_id.as_deref()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StrataError> {
        self.sql
            .execute(
                "SELECT id, role, content, timestamp FROM messages
                 WHERE conversation_id = :conversation_id ORDER BY timestamp ASC",
                vec![StatementParam::text("conversation_id", conversation_id)],
            )
            .await?
            .into_iter()
            .map(parse_message_row)
            .collect()
    }

    async fn conversation_exists(&self, id: &str) -> Result<bool, StrataError> {
        let rows = self
            .sql
            .execute(
                "SELECT id FROM conversations WHERE id = :id",
                vec![StatementParam::text("id", id)],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl Storage for WarehouseStorage {
    async fn refresh_endpoints_from_remote(&self) -> Result<Vec<Endpoint>, StrataError> {
        refresh_endpoints(&self.reference, &self.serving).await
    }

    async fn get_conversations(
        &self,
        user_email: Option<&str>,
    ) -> Result<Vec<Conversation>, StrataError> {
        let rows = match user_email {
            Some(email) => {
                self.sql
                    .execute(
                        "SELECT id, title, endpoint_id, domain_id, site_id, user_email,
                                created_at, updated_at
                         FROM conversations WHERE user_email = :user_email
                         ORDER BY updated_at DESC",
                        vec![StatementParam::text("user_email", email)],
                    )
                    .await?
            }
            None => {
                self.sql
                    .execute(
                        "SELECT id, title, endpoint_id, domain_id, site_id, user_email,
                                created_at, updated_at
                         FROM conversations ORDER BY updated_at DESC",
                        Vec::new(),
                    )
                    .await?
            }
        };

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut conversation = parse_conversation_row(row)?;
            conversation.messages = self.fetch_messages(&conversation.id).await?;
            conversations.push(conversation);
        }
        Ok(conversations)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StrataError> {
        let rows = self
            .sql
            .execute(
                "SELECT id, title, endpoint_id, domain_id, site_id, user_email,
                        created_at, updated_at
                 FROM conversations WHERE id = :id",
                vec![StatementParam::text("id", id)],
            )
            .await?;

        match rows.into_iter().next() {
            Some(row) => {
                let mut conversation = parse_conversation_row(row)?;
                conversation.messages = self.fetch_messages(id).await?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
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

        self.sql
            .execute(
                "INSERT INTO conversations VALUES
                    (:id, :title, :endpoint_id, :domain_id, :site_id, :user_email,
                     :created_at, :updated_at)",
                vec![
                    StatementParam::text("id", &conversation.id),
                    StatementParam::text("title", &conversation.title),
                    StatementParam::text("endpoint_id", &conversation.endpoint_id),
                    StatementParam::opt_text("domain_id", conversation.domain_id.as_deref()),
                    StatementParam::opt_text("site_id", conversation.site_id.as_deref()),
                    StatementParam::opt_text("user_email", conversation.user_email.as_deref()),
                    StatementParam::long("created_at", conversation.created_at),
                    StatementParam::long("updated_at", conversation.updated_at),
                ],
            )
            .await?;
        Ok(conversation)
    }

    async fn add_message(
        &self,
        conversation_id: &str,
        message: InsertMessage,
    ) -> Result<Message, StrataError> {
        if !self.conversation_exists(conversation_id).await? {
            return Err(StrataError::not_found("conversation", conversation_id));
        }

        let stored = Message {
            id: Uuid::new_v4().to_string(),
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        };

        self.sql
            .execute(
                "INSERT INTO messages VALUES (:id, :conversation_id, :role, :content, :timestamp)",
                vec![
                    StatementParam::text("id", &stored.id),
                    StatementParam::text("conversation_id", conversation_id),
                    StatementParam::text("role", stored.role.to_string()),
                    StatementParam::text("content", &stored.content),
                    StatementParam::long("timestamp", stored.timestamp),
                ],
            )
            .await?;
        self.sql
            .execute(
                "UPDATE conversations SET updated_at = :updated_at WHERE id = :id",
                vec![
                    StatementParam::long("updated_at", now_millis()),
                    StatementParam::text("id", conversation_id),
                ],
            )
            .await?;
        Ok(stored)
    }

    async fn update_conversation(
        &self,
        id: &str,
        updates: ConversationUpdate,
    ) -> Result<Option<Conversation>, StrataError> {
        if !self.conversation_exists(id).await? {
            return Ok(None);
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut params: Vec<StatementParam> = Vec::new();
        if let Some(title) = &updates.title {
            sets.push("title = :title");
            params.push(StatementParam::text("title", title));
        }
        if let Some(endpoint_id) = &updates.endpoint_id {
            sets.push("endpoint_id = :endpoint_id");
            params.push(StatementParam::text("endpoint_id", endpoint_id));
        }
        if let Some(domain_id) = &updates.domain_id {
            sets.push("domain_id = :domain_id");
            params.push(StatementParam::opt_text("domain_id", domain_id.as_deref()));
        }
        if let Some(site_id) = &updates.site_id {
            sets.push("site_id = :site_id");
            params.push(StatementParam::opt_text("site_id", site_id.as_deref()));
        }
        sets.push("updated_at = :updated_at");
        params.push(StatementParam::long("updated_at", now_millis()));
        params.push(StatementParam::text("id", id));

        let statement = format!(
            "UPDATE conversations SET {} WHERE id = :id",
            sets.join(", ")
        );
        self.sql.execute(&statement, params).await?;
        self.get_conversation(id).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, StrataError> {
        if !self.conversation_exists(id).await? {
            return Ok(false);
        }
        // No foreign keys here; cascade by hand, messages first.
        self.sql
            .execute(
                "DELETE FROM messages WHERE conversation_id = :id",
                vec![StatementParam::text("id", id)],
            )
            .await?;
        self.sql
            .execute(
                "DELETE FROM conversations WHERE id = :id",
                vec![StatementParam::text("id", id)],
            )
            .await?;
        Ok(true)
    }

    async fn get_domains(&self) -> Result<Vec<Domain>, StrataError> {
        Ok(self.reference.domains().await)
    }

    async fn get_domain(&self, id: &str) -> Result<Option<Domain>, StrataError> {
        Ok(self.reference.domain(id).await)
    }

    async fn create_domain(&self, domain: InsertDomain) -> Result<Domain, StrataError> {
        // Reserve the id in the cache first (the id-derivation loop is
        // atomic there), then write through; roll back on failure.
        let created = self.reference.insert_domain(domain).await;
        if let Err(e) = self.write_domain(&created).await {
            self.reference.remove_domain(&created.id).await;
            return Err(e);
        }
        Ok(created)
    }

    async fn update_domain(
        &self,
        id: &str,
        updates: DomainUpdate,
    ) -> Result<Option<Domain>, StrataError> {
        let Some(merged) = self.reference.update_domain(id, updates).await else {
            return Ok(None);
        };
        self.sql
            .execute(
                "UPDATE domains SET name = :name, description = :description,
                        system_prompt = :system_prompt, icon = :icon
                 WHERE id = :id",
                vec![
                    StatementParam::text("name", &merged.name),
                    StatementParam::text("description", &merged.description),
                    StatementParam::text("system_prompt", &merged.system_prompt),
                    StatementParam::opt_text("icon", merged.icon.as_deref()),
                    StatementParam::text("id", id),
                ],
            )
            .await?;
        Ok(Some(merged))
    }

    async fn delete_domain(&self, id: &str) -> Result<bool, StrataError> {
        self.sql
            .execute(
                "DELETE FROM domains WHERE id = :id",
                vec![StatementParam::text("id", id)],
            )
            .await?;
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
        let created = self.reference.insert_endpoint(endpoint).await;
        if let Err(e) = self.write_endpoint(&created).await {
            self.reference.remove_endpoint(&created.id).await;
            return Err(e);
        }
        Ok(created)
    }

    async fn update_endpoint(
        &self,
        id: &str,
        updates: EndpointUpdate,
    ) -> Result<Option<Endpoint>, StrataError> {
        let Some(merged) = self.reference.update_endpoint(id, updates).await else {
            return Ok(None);
        };
        self.sql
            .execute(
                "UPDATE endpoints SET name = :name, description = :description,
                        type = :type, is_default = :is_default, domain_id = :domain_id
                 WHERE id = :id",
                vec![
                    StatementParam::text("name", &merged.name),
                    StatementParam::text("description", &merged.description),
                    StatementParam::text("type", merged.endpoint_type.to_string()),
                    StatementParam::boolean("is_default", merged.is_default),
                    StatementParam::opt_text("domain_id", merged.domain_id.as_deref()),
                    StatementParam::text("id", id),
                ],
            )
            .await?;
        Ok(Some(merged))
    }

    async fn delete_endpoint(&self, id: &str) -> Result<bool, StrataError> {
        self.sql
            .execute(
                "DELETE FROM endpoints WHERE id = :id",
                vec![StatementParam::text("id", id)],
            )
            .await?;
        Ok(self.reference.remove_endpoint(id).await)
    }

    async fn get_config(&self) -> Result<AppConfig, StrataError> {
        Ok(self.reference.config().await)
    }

    async fn set_config(&self, config: AppConfig) -> Result<AppConfig, StrataError> {
        self.sql
            .execute(
                "DELETE FROM user_config WHERE user_id = :user_id",
                vec![StatementParam::text("user_id", CONFIG_ROW_ID)],
            )
            .await?;
        self.sql
            .execute(
                "INSERT INTO user_config VALUES
                    (:user_id, :default_endpoint_id, :default_domain_id,
                     :default_site_id, :system_prompt)",
                vec![
                    StatementParam::text("user_id", CONFIG_ROW_ID),
                    StatementParam::opt_text(
                        "default_endpoint_id",
                        config.default_endpoint_id.as_deref(),
                    ),
                    StatementParam::opt_text(
                        "default_domain_id",
                        config.default_domain_id.as_deref(),
                    ),
                    StatementParam::opt_text(
                        "default_site_id",
                        config.default_site_id.as_deref(),
                    ),
                    StatementParam::opt_text("system_prompt", config.system_prompt.as_deref()),
                ],
            )
            .await?;
        Ok(self.reference.set_config(config).await)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

fn parse_conversation_row(row: Vec<Option<String>>) -> Result<Conversation, StrataError> {
    let mut cells = row.into_iter();
    let mut next = || cells.next().unwrap_or(None);
    Ok(Conversation {
        id: required_cell(next(), "conversations.id")?,
        title: required_cell(next(), "conversations.title")?,
        messages: Vec::new(),
        endpoint_id: required_cell(next(), "conversations.endpoint_id")?,
        domain_id: next(),
        site_id: next(),
        user_email: next(),
        created_at: parse_i64(next(), "conversations.created_at")?,
        updated_at: parse_i64(next(), "conversations.updated_at")?,
    })
}

fn parse_message_row(row: Vec<Option<String>>) -> Result<Message, StrataError> {
    let mut cells = row.into_iter();
    let mut next = || cells.next().unwrap_or(None);
    Ok(Message {
        id: required_cell(next(), "messages.id")?,
        role: parse_role(required_cell(next(), "messages.role")?)?,
        content: required_cell(next(), "messages.content")?,
        timestamp: parse_i64(next(), "messages.timestamp")?,
    })
}

fn parse_domain_row(row: Vec<Option<String>>) -> Result<Domain, StrataError> {
    let mut cells = row.into_iter();
    let mut next = || cells.next().unwrap_or(None);
    Ok(Domain {
        id: required_cell(next(), "domains.id")?,
        name: required_cell(next(), "domains.name")?,
        description: required_cell(next(), "domains.description")?,
        system_prompt: required_cell(next(), "domains.system_prompt")?,
        icon: next(),
    })
}

fn parse_site_row(row: Vec<Option<String>>) -> Result<Site, StrataError> {
    let mut cells = row.into_iter();
    let mut next = || cells.next().unwrap_or(None);
    Ok(Site {
        id: required_cell(next(), "sites.id")?,
        name: required_cell(next(), "sites.name")?,
        location: required_cell(next(), "sites.location")?,
        kind: required_cell(next(), "sites.type")?,
    })
}

fn parse_endpoint_row(row: Vec<Option<String>>) -> Result<Endpoint, StrataError> {
    let mut cells = row.into_iter();
    let mut next = || cells.next().unwrap_or(None);
    Ok(Endpoint {
        id: required_cell(next(), "endpoints.id")?,
        name: required_cell(next(), "endpoints.name")?,
        description: required_cell(next(), "endpoints.description")?,
        endpoint_type: {
            let raw = required_cell(next(), "endpoints.type")?;
            raw.parse::<EndpointType>().unwrap_or_else(|_| {
                warn!(raw, "unknown endpoint type in warehouse row, treating as custom");
                EndpointType::Custom
            })
        },
        is_default: parse_bool(next()),
        domain_id: next(),
    })
}

fn parse_config_row(row: Vec<Option<String>>) -> AppConfig {
    let mut cells = row.into_iter();
    let mut next = || cells.next().unwrap_or(None);
    AppConfig {
        default_endpoint_id: next(),
        default_domain_id: next(),
        default_site_id: next(),
        system_prompt: next(),
    }
}

fn required_cell(cell: Option<String>, column: &str) -> Result<String, StrataError> {
    cell.ok_or_else(|| StrataError::Internal(format!("unexpected NULL in {column}")))
}

fn parse_i64(cell: Option<String>, column: &str) -> Result<i64, StrataError> {
    required_cell(cell, column)?
        .parse::<i64>()
        .map_err(|e| StrataError::Internal(format!("bad integer in {column}: {e}")))
}

fn parse_bool(cell: Option<String>) -> bool {
    cell.as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::MessageRole;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn statement_client(base: &str) -> StatementClient {
        let serving = Arc::new(
            ServingClient::new(&WorkspaceSettings {
                host: Some(base.to_string()),
                token: Some("tok".into()),
                ..Default::default()
            })
            .unwrap(),
        );
        StatementClient::new(
            base.to_string(),
            "abc123".into(),
            "main".into(),
            "strata".into(),
            serving,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn execute_returns_rows_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/sql/statements"))
            .and(body_string_contains("\"warehouse_id\":\"abc123\""))
            .and(body_string_contains("\"name\":\"id\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": {"state": "SUCCEEDED"},
                "result": {"data_array": [["c-1", "Hello"], ["c-2", null]]}
            })))
            .mount(&server)
            .await;

        let client = statement_client(&server.uri());
        let rows = client
            .execute(
                "SELECT id, title FROM conversations WHERE id = :id",
                vec![StatementParam::text("id", "c-1")],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].as_deref(), Some("c-1"));
        assert_eq!(rows[1][1], None);
    }

    #[tokio::test]
    async fn execute_surfaces_failed_statements() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/sql/statements"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": {"state": "FAILED", "error": {"message": "TABLE_NOT_FOUND"}}
            })))
            .mount(&server)
            .await;

        let client = statement_client(&server.uri());
        let err = client.execute("SELECT 1", Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("TABLE_NOT_FOUND"), "got: {err}");
    }

    #[tokio::test]
    async fn execute_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/sql/statements"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = statement_client(&server.uri());
        assert!(client.execute("SELECT 1", Vec::new()).await.is_err());
    }

    #[test]
    fn conversation_rows_parse_with_nullable_columns() {
        let conversation = parse_conversation_row(vec![
            Some("c-1".into()),
            Some("Hello".into()),
            Some("llama-3-70b".into()),
            None,
            None,
            Some("a@example.com".into()),
            Some("1000".into()),
            Some("2000".into()),
        ])
        .unwrap();
        assert_eq!(conversation.id, "c-1");
        assert_eq!(conversation.domain_id, None);
        assert_eq!(conversation.created_at, 1000);
        assert_eq!(conversation.updated_at, 2000);
    }

    #[test]
    fn message_rows_parse_role_and_timestamp() {
        let message = parse_message_row(vec![
            Some("m-1".into()),
            Some("assistant".into()),
            Some("Hi".into()),
            Some("1234".into()),
        ])
        .unwrap();
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.timestamp, 1234);

        let err = parse_message_row(vec![
            Some("m-2".into()),
            Some("user".into()),
            Some("Hi".into()),
            Some("not-a-number".into()),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("messages.timestamp"));
    }

    #[test]
    fn endpoint_rows_parse_type_and_default_flag() {
        let endpoint = parse_endpoint_row(vec![
            Some("llama-3-70b".into()),
            Some("Llama 3 70B".into()),
            Some("d".into()),
            Some("foundation".into()),
            Some("true".into()),
            None,
        ])
        .unwrap();
        assert_eq!(endpoint.endpoint_type, EndpointType::Foundation);
        assert!(endpoint.is_default);

        let fallback = parse_endpoint_row(vec![
            Some("x".into()),
            Some("X".into()),
            Some("d".into()),
            Some("mystery".into()),
            Some("false".into()),
            None,
        ])
        .unwrap();
        assert_eq!(fallback.endpoint_type, EndpointType::Custom);
    }
}
