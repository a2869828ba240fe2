// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the Strata workspace.

use thiserror::Error;

/// The primary error type used across the storage contract, the serving
/// client, and the gateway.
#[derive(Debug, Error)]
pub enum StrataError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The remote serving API could not be reached or returned an
    /// unusable response. Callers recover from cached local state or a
    /// canned response; this never becomes a hard failure for end users.
    #[error("remote serving API unavailable: {message}")]
    RemoteUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Required configuration (credentials, hosts) is absent.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Configuration was present but invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A storage backend failed to come up (connection, schema creation).
    /// The selector treats this as a signal to fall back, not to abort.
    #[error("storage initialization failed: {source}")]
    StorageInit {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A storage operation failed at runtime.
    #[error("storage error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Shorthand for a [`StrataError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether this error maps to a 404-equivalent for API callers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error means the remote serving API is unreachable.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = StrataError::not_found("conversation", "c-123");
        assert_eq!(err.to_string(), "conversation not found: c-123");
        assert!(err.is_not_found());
        assert!(!err.is_remote_unavailable());
    }

    #[test]
    fn remote_unavailable_is_classified() {
        let err = StrataError::RemoteUnavailable {
            message: "connection refused".into(),
            source: None,
        };
        assert!(err.is_remote_unavailable());
        assert!(!err.is_not_found());
    }
}
