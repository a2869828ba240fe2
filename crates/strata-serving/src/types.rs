// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the serving API.
//!
//! Descriptors are deserialized leniently: the remote API evolves and
//! fields appear or vanish across workspace versions, so everything is
//! optional with defaults.

use serde::{Deserialize, Serialize};
use strata_core::MessageRole;

/// Raw endpoint descriptor as returned by the serving API listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointDescriptor {
    #[serde(default)]
    pub name: String,

    /// Declared task, e.g. `"Agent (Responses)"` for agent endpoints.
    #[serde(default)]
    pub task: Option<String>,

    #[serde(default)]
    pub config: Option<EndpointConfig>,

    #[serde(default)]
    pub state: Option<EndpointState>,

    #[serde(default)]
    pub route_optimized: bool,
}

impl EndpointDescriptor {
    /// Whether the endpoint reports itself ready to serve traffic.
    pub fn is_ready(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.ready.as_deref())
            .is_some_and(|r| r == "READY")
    }
}

/// Config block of an endpoint descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub served_entities: Vec<ServedEntity>,
}

/// A sub-entity served by an endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServedEntity {
    /// Present (any shape) when the entity proxies an external model.
    #[serde(default)]
    pub external_model: Option<serde_json::Value>,

    #[serde(default)]
    pub entity_name: Option<String>,

    /// Version metadata; a number or a string depending on entity kind.
    #[serde(default)]
    pub entity_version: Option<serde_json::Value>,
}

impl ServedEntity {
    /// Version rendered as a string regardless of wire type.
    pub fn version_string(&self) -> Option<String> {
        self.entity_version.as_ref().map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Readiness state of an endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointState {
    #[serde(default)]
    pub ready: Option<String>,
}

/// Response envelope of `GET /api/2.0/serving-endpoints`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEndpointsResponse {
    #[serde(default)]
    pub endpoints: Vec<EndpointDescriptor>,
}

/// One message in an invocation request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Response of the OAuth client-credential exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Response of the database credential minting endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCredential {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_tolerates_missing_fields() {
        let descriptor: EndpointDescriptor = serde_json::from_str(r#"{"name":"m1"}"#).unwrap();
        assert_eq!(descriptor.name, "m1");
        assert!(descriptor.task.is_none());
        assert!(!descriptor.route_optimized);
        assert!(!descriptor.is_ready());
    }

    #[test]
    fn readiness_requires_exact_ready_state() {
        let descriptor: EndpointDescriptor = serde_json::from_str(
            r#"{"name":"m1","state":{"ready":"READY"}}"#,
        )
        .unwrap();
        assert!(descriptor.is_ready());

        let descriptor: EndpointDescriptor = serde_json::from_str(
            r#"{"name":"m1","state":{"ready":"NOT_READY"}}"#,
        )
        .unwrap();
        assert!(!descriptor.is_ready());
    }

    #[test]
    fn entity_version_renders_numbers_and_strings() {
        let entity: ServedEntity = serde_json::from_str(r#"{"entity_version":3}"#).unwrap();
        assert_eq!(entity.version_string().as_deref(), Some("3"));

        let entity: ServedEntity =
            serde_json::from_str(r#"{"entity_version":"agent-v2"}"#).unwrap();
        assert_eq!(entity.version_string().as_deref(), Some("agent-v2"));
    }

    #[test]
    fn chat_message_serializes_role_lowercase() {
        let msg = ChatMessage::new(MessageRole::System, "You are helpful.");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"You are helpful."}"#);
    }
}
