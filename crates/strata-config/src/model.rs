// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model for the Strata backend.
//!
//! Backend and remote-client activation is driven by which hosts and
//! credentials are *present*, not by explicit mode flags; the storage
//! selector probes these sections in a fixed order at startup.

use serde::{Deserialize, Serialize};

/// Top-level Strata configuration.
///
/// Loaded from `strata.toml` with `STRATA_*` environment variable
/// overrides. Every section defaults so the service always starts (an
/// empty config yields the in-memory backend and the mock responder).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// HTTP server bind settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Workspace (remote serving platform) connection settings.
    #[serde(default)]
    pub workspace: WorkspaceSettings,

    /// Postgres connection settings.
    #[serde(default)]
    pub postgres: PostgresSettings,

    /// SQL warehouse settings.
    #[serde(default)]
    pub warehouse: WarehouseSettings,
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// When enabled and no identity headers arrive, requests resolve to
    /// a fixed developer identity instead of anonymous.
    #[serde(default)]
    pub dev_user: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_user: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Connection settings for the workspace hosting the model-serving API
/// and the OAuth token endpoint.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    /// Workspace base URL. A bare hostname is normalized to `https://`.
    #[serde(default)]
    pub host: Option<String>,

    /// OAuth client id for the client-credential exchange.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret for the client-credential exchange.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Static personal access token. Takes precedence over the
    /// client-credential exchange when present.
    #[serde(default)]
    pub token: Option<String>,

    /// Managed database instance name used when minting short-lived
    /// database credentials.
    #[serde(default)]
    pub instance_name: Option<String>,
}

impl WorkspaceSettings {
    /// The workspace is usable when a host is present together with
    /// either a static token or a full client-credential pair.
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
            && (self.token.is_some()
                || (self.client_id.is_some() && self.client_secret.is_some()))
    }

    /// Whether a client-credential pair is present.
    pub fn has_client_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Base URL with an `https://` scheme and no trailing slash.
    pub fn base_url(&self) -> Option<String> {
        self.host.as_deref().map(|raw| {
            let trimmed = raw.trim_end_matches('/');
            if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                trimmed.to_string()
            } else {
                format!("https://{trimmed}")
            }
        })
    }
}

impl std::fmt::Debug for WorkspaceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSettings")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("instance_name", &self.instance_name)
            .finish()
    }
}

/// Postgres connection settings. Host, database, and user presence
/// drive backend selection; password auth applies to the raw backend
/// only (the managed backend injects minted tokens instead).
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresSettings {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Pool size for either Postgres backend.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: default_pg_port(),
            database: None,
            user: None,
            password: None,
            pool_size: default_pool_size(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pool_size() -> usize {
    5
}

impl std::fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// SQL warehouse settings. The warehouse shares the workspace host and
/// credentials; `http_path` identifies the warehouse itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseSettings {
    /// Warehouse HTTP path, e.g. `/sql/1.0/warehouses/abc123`.
    #[serde(default)]
    pub http_path: Option<String>,

    /// Catalog to create tables in.
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Schema to create tables in.
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            http_path: None,
            catalog: default_catalog(),
            schema: default_schema(),
        }
    }
}

impl WarehouseSettings {
    /// The warehouse id is the final segment of the HTTP path.
    pub fn warehouse_id(&self) -> Option<&str> {
        self.http_path
            .as_deref()
            .and_then(|p| p.trim_end_matches('/').rsplit('/').next())
            .filter(|s| !s.is_empty())
    }
}

fn default_catalog() -> String {
    "main".to_string()
}

fn default_schema() -> String {
    "strata".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_configured_requires_host_and_credentials() {
        let mut ws = WorkspaceSettings::default();
        assert!(!ws.is_configured());

        ws.host = Some("example.cloud".into());
        assert!(!ws.is_configured());

        ws.token = Some("tok".into());
        assert!(ws.is_configured());

        ws.token = None;
        ws.client_id = Some("id".into());
        assert!(!ws.is_configured(), "client id alone is not enough");

        ws.client_secret = Some("secret".into());
        assert!(ws.is_configured());
    }

    #[test]
    fn base_url_normalizes_scheme_and_trailing_slash() {
        let ws = WorkspaceSettings {
            host: Some("example.cloud/".into()),
            ..Default::default()
        };
        assert_eq!(ws.base_url().as_deref(), Some("https://example.cloud"));

        let ws = WorkspaceSettings {
            host: Some("http://localhost:9999".into()),
            ..Default::default()
        };
        assert_eq!(ws.base_url().as_deref(), Some("http://localhost:9999"));
    }

    #[test]
    fn warehouse_id_is_last_path_segment() {
        let wh = WarehouseSettings {
            http_path: Some("/sql/1.0/warehouses/abc123".into()),
            ..Default::default()
        };
        assert_eq!(wh.warehouse_id(), Some("abc123"));

        assert_eq!(WarehouseSettings::default().warehouse_id(), None);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let ws = WorkspaceSettings {
            host: Some("example.cloud".into()),
            client_secret: Some("hunter2".into()),
            token: Some("tok-123".into()),
            ..Default::default()
        };
        let debug = format!("{ws:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("tok-123"));

        let pg = PostgresSettings {
            password: Some("pgpass".into()),
            ..Default::default()
        };
        let debug = format!("{pg:?}");
        assert!(!debug.contains("pgpass"));
    }
}
