// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage backend.
//!
//! The final fallback in the selection order: always available, never
//! durable. Conversations live in a process-local map; reference data
//! lives in the shared [`ReferenceCache`] like every other backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use strata_core::{
    AppConfig, Conversation, ConversationUpdate, Domain, DomainUpdate, Endpoint,
    EndpointUpdate, InsertDomain, InsertEndpoint, InsertMessage, Message, Site, Storage,
    StrataError,
};
use strata_serving::ServingClient;

use crate::cache::{ReferenceCache, refresh_endpoints};
use crate::now_millis;

/// Volatile storage backend.
pub struct MemoryStorage {
    serving: Arc<ServingClient>,
    reference: ReferenceCache,
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryStorage {
    pub fn new(serving: Arc<ServingClient>) -> Self {
        Self {
            serving,
            reference: ReferenceCache::seeded(),
            conversations: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn refresh_endpoints_from_remote(&self) -> Result<Vec<Endpoint>, StrataError> {
        refresh_endpoints(&self.reference, &self.serving).await
    }

    async fn get_conversations(
        &self,
        user_email: Option<&str>,
    ) -> Result<Vec<Conversation>, StrataError> {
        let conversations = self.conversations.read().await;
        let mut result: Vec<Conversation> = conversations
            .values()
            .filter(|c| match user_email {
                Some(email) => c.user_email.as_deref() == Some(email),
                None => true,
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(result)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StrataError> {
        Ok(self.conversations.read().await.get(id).cloned())
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
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn add_message(
        &self,
        conversation_id: &str,
        message: InsertMessage,
    ) -> Result<Message, StrataError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StrataError::not_found("conversation", conversation_id))?;

        let stored = Message {
            id: Uuid::new_v4().to_string(),
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        };
        conversation.messages.push(stored.clone());
        // Messages must stay chronological even when a caller supplies
        // an out-of-order timestamp.
        if conversation
            .messages
            .windows(2)
            .any(|w| w[0].timestamp > w[1].timestamp)
        {
            conversation.messages.sort_by_key(|m| m.timestamp);
        }
        conversation.updated_at = now_millis().max(conversation.updated_at);
        Ok(stored)
    }

    async fn update_conversation(
        &self,
        id: &str,
        updates: ConversationUpdate,
    ) -> Result<Option<Conversation>, StrataError> {
        let mut conversations = self.conversations.write().await;
        let Some(conversation) = conversations.get_mut(id) else {
            return Ok(None);
        };

        if let Some(title) = updates.title {
            conversation.title = title;
        }
        if let Some(endpoint_id) = updates.endpoint_id {
            conversation.endpoint_id = endpoint_id;
        }
        if let Some(domain_id) = updates.domain_id {
            conversation.domain_id = domain_id;
        }
        if let Some(site_id) = updates.site_id {
            conversation.site_id = site_id;
        }
        conversation.updated_at = now_millis().max(conversation.updated_at);
        Ok(Some(conversation.clone()))
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, StrataError> {
        Ok(self.conversations.write().await.remove(id).is_some())
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
        Ok(())
    }
}
