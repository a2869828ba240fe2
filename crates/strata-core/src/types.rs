// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity model: conversations, messages, and the organizational
//! reference data (domains, sites, endpoints, app config).
//!
//! Wire names are camelCase to match the web client. All records are
//! plain values; the storage layer owns their lifecycles.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

/// Role of a chat message author.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single chat message. Created by the storage layer on append and
/// never mutated afterwards; removed only when its conversation is
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// A message as supplied by a caller, before the storage layer assigns
/// an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
}

/// A conversation with its messages in chronological order.
///
/// `updated_at` advances on every message append and on any field
/// update; `updated_at >= created_at` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub endpoint_id: String,
    pub domain_id: Option<String>,
    pub site_id: Option<String>,
    pub user_email: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Recognized fields for a partial conversation update. Inner `None`
/// clears a nullable field; an absent key leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub endpoint_id: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub domain_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub site_id: Option<Option<String>>,
}

/// A subject-matter persona bundling a system prompt with display
/// metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub icon: Option<String>,
}

/// Domain fields as supplied on creation; the id is derived from the
/// name by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertDomain {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Partial domain update, merged onto the existing record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
}

impl Domain {
    /// Merge a partial update onto this record, yielding the complete
    /// replacement record.
    pub fn merged(&self, updates: DomainUpdate) -> Domain {
        Domain {
            id: self.id.clone(),
            name: updates.name.unwrap_or_else(|| self.name.clone()),
            description: updates.description.unwrap_or_else(|| self.description.clone()),
            system_prompt: updates
                .system_prompt
                .unwrap_or_else(|| self.system_prompt.clone()),
            icon: match updates.icon {
                Some(icon) => icon,
                None => self.icon.clone(),
            },
        }
    }
}

/// A read-only organizational location reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Classification of a remote model-serving endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EndpointType {
    /// General-purpose hosted LLM.
    Foundation,
    /// Bespoke model.
    Custom,
    /// Tool-using assistant.
    Agent,
}

/// A named remote model-serving target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub endpoint_type: EndpointType,
    pub is_default: bool,
    pub domain_id: Option<String>,
}

/// Endpoint fields as supplied on creation; the id is derived from the
/// name by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertEndpoint {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub endpoint_type: EndpointType,
    pub is_default: bool,
    #[serde(default)]
    pub domain_id: Option<String>,
}

/// Partial endpoint update, merged onto the existing record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub endpoint_type: Option<EndpointType>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub domain_id: Option<Option<String>>,
}

impl Endpoint {
    /// Merge a partial update onto this record, yielding the complete
    /// replacement record.
    pub fn merged(&self, updates: EndpointUpdate) -> Endpoint {
        Endpoint {
            id: self.id.clone(),
            name: updates.name.unwrap_or_else(|| self.name.clone()),
            description: updates.description.unwrap_or_else(|| self.description.clone()),
            endpoint_type: updates.endpoint_type.unwrap_or(self.endpoint_type),
            is_default: updates.is_default.unwrap_or(self.is_default),
            domain_id: match updates.domain_id {
                Some(domain_id) => domain_id,
                None => self.domain_id.clone(),
            },
        }
    }
}

/// Process-wide user preferences, replaced wholesale on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub default_endpoint_id: Option<String>,
    #[serde(default)]
    pub default_domain_id: Option<String>,
    #[serde(default)]
    pub default_site_id: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Per-request identity derived from trusted proxy headers. Never
/// persisted.
#[derive(Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub display_name: Option<String>,
}

impl std::fmt::Debug for UserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserContext")
            .field("email", &self.email)
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl UserContext {
    /// A user is authenticated exactly when the proxy forwarded an email.
    pub fn is_authenticated(&self) -> bool {
        self.email.is_some()
    }

    /// Stable storage key for the user: lowercased email with `@` and
    /// `.` mapped to underscore forms, or `"anonymous"`.
    pub fn user_id(&self) -> String {
        match &self.email {
            Some(email) => email.to_lowercase().replace('@', "_at_").replace('.', "_"),
            None => "anonymous".to_string(),
        }
    }
}

/// Distinguishes "key absent" from "key present with null" during
/// deserialization of partial updates.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
