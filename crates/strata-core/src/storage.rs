// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The storage contract every persistence backend implements.
//!
//! Backends differ only in durability and in how remote refresh and
//! credential acquisition work; observable behavior of every operation
//! is identical across implementations.

use async_trait::async_trait;

use crate::error::StrataError;
use crate::types::{
    AppConfig, Conversation, ConversationUpdate, Domain, DomainUpdate, Endpoint,
    EndpointUpdate, InsertDomain, InsertEndpoint, InsertMessage, Message, Site,
};

/// Uniform persistence contract over conversations, messages, and the
/// organizational reference data.
///
/// All operations may suspend on I/O and never block a shared thread.
/// Implementations must uphold:
///
/// - Domain/Endpoint ids derive from the name with `-1`, `-2`, ...
///   suffixes on collision, with no gaps or reuse.
/// - Conversation messages stay sorted by timestamp ascending and
///   `updated_at` never decreases.
/// - [`refresh_endpoints_from_remote`](Storage::refresh_endpoints_from_remote)
///   never leaves the endpoint set empty because a refresh failed.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Query the remote serving API and, on a successful non-empty
    /// listing, atomically replace the cached endpoint set. On failure
    /// or an empty listing the existing set is kept and returned; the
    /// condition is logged, never raised.
    async fn refresh_endpoints_from_remote(&self) -> Result<Vec<Endpoint>, StrataError>;

    /// All conversations, optionally filtered by owner email, ordered
    /// by `updated_at` descending.
    async fn get_conversations(
        &self,
        user_email: Option<&str>,
    ) -> Result<Vec<Conversation>, StrataError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StrataError>;

    /// Create a conversation with a fresh id and
    /// `created_at == updated_at == now`.
    async fn create_conversation(
        &self,
        endpoint_id: &str,
        title: &str,
        domain_id: Option<&str>,
        site_id: Option<&str>,
        user_email: Option<&str>,
    ) -> Result<Conversation, StrataError>;

    /// Append a message, assigning a fresh id and bumping the parent
    /// conversation's `updated_at`. Fails with
    /// [`StrataError::NotFound`] for an unknown conversation.
    async fn add_message(
        &self,
        conversation_id: &str,
        message: InsertMessage,
    ) -> Result<Message, StrataError>;

    /// Apply the recognized fields of a partial update and bump
    /// `updated_at`. `None` when the id is unknown.
    async fn update_conversation(
        &self,
        id: &str,
        updates: ConversationUpdate,
    ) -> Result<Option<Conversation>, StrataError>;

    /// Delete a conversation and cascade to its messages. Returns
    /// whether a row existed.
    async fn delete_conversation(&self, id: &str) -> Result<bool, StrataError>;

    async fn get_domains(&self) -> Result<Vec<Domain>, StrataError>;

    async fn get_domain(&self, id: &str) -> Result<Option<Domain>, StrataError>;

    async fn create_domain(&self, domain: InsertDomain) -> Result<Domain, StrataError>;

    async fn update_domain(
        &self,
        id: &str,
        updates: DomainUpdate,
    ) -> Result<Option<Domain>, StrataError>;

    async fn delete_domain(&self, id: &str) -> Result<bool, StrataError>;

    async fn get_sites(&self) -> Result<Vec<Site>, StrataError>;

    async fn get_site(&self, id: &str) -> Result<Option<Site>, StrataError>;

    /// Endpoints visible for a domain filter: endpoints with no domain
    /// scope, endpoints scoped to the given domain, and every
    /// foundation-type endpoint regardless of scope.
    async fn get_endpoints(&self, domain_id: Option<&str>) -> Result<Vec<Endpoint>, StrataError>;

    async fn get_endpoint(&self, id: &str) -> Result<Option<Endpoint>, StrataError>;

    async fn create_endpoint(&self, endpoint: InsertEndpoint) -> Result<Endpoint, StrataError>;

    async fn update_endpoint(
        &self,
        id: &str,
        updates: EndpointUpdate,
    ) -> Result<Option<Endpoint>, StrataError>;

    async fn delete_endpoint(&self, id: &str) -> Result<bool, StrataError>;

    async fn get_config(&self) -> Result<AppConfig, StrataError>;

    /// Replace the config wholesale; there are no partial-field
    /// semantics here.
    async fn set_config(&self, config: AppConfig) -> Result<AppConfig, StrataError>;

    /// Cancel background tasks and release pooled resources. Called
    /// once at process shutdown.
    async fn shutdown(&self) -> Result<(), StrataError>;
}
