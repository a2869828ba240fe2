// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema and query helpers shared by both Postgres backends.
//!
//! Helpers take a plain [`tokio_postgres::Client`]; each backend
//! acquires a connection from its own pool and delegates here. Every
//! value is bound as a parameter, ids included.

use tokio_postgres::Client;
use tokio_postgres::types::ToSql;

use strata_core::{Conversation, ConversationUpdate, Message, MessageRole, StrataError};

/// Idempotent schema setup for the conversation tables.
pub(crate) async fn create_schema(client: &Client) -> Result<(), StrataError> {
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                endpoint_id TEXT NOT NULL,
                domain_id TEXT,
                site_id TEXT,
                user_email TEXT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_user_email
                ON conversations(user_email);
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_id
                ON messages(conversation_id);",
        )
        .await
        .map_err(|e| map_pg_err("create_schema", e))
}

pub(crate) async fn list_conversations(
    client: &Client,
    user_email: Option<&str>,
) -> Result<Vec<Conversation>, StrataError> {
    let rows = match user_email {
        Some(email) => {
            client
                .query(
                    "SELECT id, title, endpoint_id, domain_id, site_id, user_email,
                            created_at, updated_at
                     FROM conversations WHERE user_email = $1
                     ORDER BY updated_at DESC",
                    &[&email],
                )
                .await
        }
        None => {
            client
                .query(
                    "SELECT id, title, endpoint_id, domain_id, site_id, user_email,
                            created_at, updated_at
                     FROM conversations ORDER BY updated_at DESC",
                    &[],
                )
                .await
        }
    }
    .map_err(|e| map_pg_err("list_conversations", e))?;

    let mut conversations = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get(0);
        let messages = fetch_messages(client, &id).await?;
        conversations.push(row_to_conversation(&row, messages)?);
    }
    Ok(conversations)
}

pub(crate) async fn get_conversation(
    client: &Client,
    id: &str,
) -> Result<Option<Conversation>, StrataError> {
    let row = client
        .query_opt(
            "SELECT id, title, endpoint_id, domain_id, site_id, user_email,
                    created_at, updated_at
             FROM conversations WHERE id = $1",
            &[&id],
        )
        .await
        .map_err(|e| map_pg_err("get_conversation", e))?;

    match row {
        Some(row) => {
            let messages = fetch_messages(client, id).await?;
            Ok(Some(row_to_conversation(&row, messages)?))
        }
        None => Ok(None),
    }
}

pub(crate) async fn conversation_exists(client: &Client, id: &str) -> Result<bool, StrataError> {
    let row = client
        .query_opt("SELECT 1 FROM conversations WHERE id = $1", &[&id])
        .await
        .map_err(|e| map_pg_err("conversation_exists", e))?;
    Ok(row.is_some())
}

pub(crate) async fn insert_conversation(
    client: &Client,
    conversation: &Conversation,
) -> Result<(), StrataError> {
    client
        .execute(
            "INSERT INTO conversations
                (id, title, endpoint_id, domain_id, site_id, user_email, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &conversation.id,
                &conversation.title,
                &conversation.endpoint_id,
                &conversation.domain_id,
                &conversation.site_id,
                &conversation.user_email,
                &conversation.created_at,
                &conversation.updated_at,
            ],
        )
        .await
        .map_err(|e| map_pg_err("insert_conversation", e))?;
    Ok(())
}

/// Insert a message and bump the parent conversation's `updated_at`.
/// The caller has already verified the conversation exists.
pub(crate) async fn insert_message(
    client: &Client,
    conversation_id: &str,
    message: &Message,
    touched_at: i64,
) -> Result<(), StrataError> {
    client
        .execute(
            "INSERT INTO messages (id, conversation_id, role, content, timestamp)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &message.id,
                &conversation_id,
                &message.role.to_string(),
                &message.content,
                &message.timestamp,
            ],
        )
        .await
        .map_err(|e| map_pg_err("insert_message", e))?;

    client
        .execute(
            "UPDATE conversations SET updated_at = GREATEST(updated_at, $1) WHERE id = $2",
            &[&touched_at, &conversation_id],
        )
        .await
        .map_err(|e| map_pg_err("touch_conversation", e))?;
    Ok(())
}

/// Apply the recognized fields of a partial update. The SET clause is
/// assembled dynamically but every value still binds as a parameter.
pub(crate) async fn apply_conversation_update(
    client: &Client,
    id: &str,
    updates: &ConversationUpdate,
    updated_at: i64,
) -> Result<(), StrataError> {
    let mut sets: Vec<String> = Vec::new();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

    if let Some(title) = &updates.title {
        params.push(title);
        sets.push(format!("title = ${}", params.len()));
    }
    if let Some(endpoint_id) = &updates.endpoint_id {
        params.push(endpoint_id);
        sets.push(format!("endpoint_id = ${}", params.len()));
    }
    if let Some(domain_id) = &updates.domain_id {
        params.push(domain_id);
        sets.push(format!("domain_id = ${}", params.len()));
    }
    if let Some(site_id) = &updates.site_id {
        params.push(site_id);
        sets.push(format!("site_id = ${}", params.len()));
    }
    params.push(&updated_at);
    sets.push(format!("updated_at = ${}", params.len()));

    params.push(&id);
    let sql = format!(
        "UPDATE conversations SET {} WHERE id = ${}",
        sets.join(", "),
        params.len()
    );

    client
        .execute(&sql, &params)
        .await
        .map_err(|e| map_pg_err("update_conversation", e))?;
    Ok(())
}

/// Delete a conversation; messages cascade through the foreign key.
pub(crate) async fn delete_conversation(client: &Client, id: &str) -> Result<bool, StrataError> {
    let deleted = client
        .execute("DELETE FROM conversations WHERE id = $1", &[&id])
        .await
        .map_err(|e| map_pg_err("delete_conversation", e))?;
    Ok(deleted > 0)
}

async fn fetch_messages(client: &Client, conversation_id: &str) -> Result<Vec<Message>, StrataError> {
    let rows = client
        .query(
            "SELECT id, role, content, timestamp FROM messages
             WHERE conversation_id = $1 ORDER BY timestamp ASC",
            &[&conversation_id],
        )
        .await
        .map_err(|e| map_pg_err("fetch_messages", e))?;

    rows.iter()
        .map(|row| {
            Ok(Message {
                id: row.get(0),
                role: parse_role(row.get(1))?,
                content: row.get(2),
                timestamp: row.get(3),
            })
        })
        .collect()
}

fn row_to_conversation(
    row: &tokio_postgres::Row,
    messages: Vec<Message>,
) -> Result<Conversation, StrataError> {
    Ok(Conversation {
        id: row.get(0),
        title: row.get(1),
        messages,
        endpoint_id: row.get(2),
        domain_id: row.get(3),
        site_id: row.get(4),
        user_email: row.get(5),
        created_at: row.get(6),
        updated_at: row.get(7),
    })
}

pub(crate) fn parse_role(raw: String) -> Result<MessageRole, StrataError> {
    raw.parse::<MessageRole>()
        .map_err(|_| StrataError::Internal(format!("unknown message role in storage: {raw}")))
}

pub(crate) fn map_pg_err(operation: &'static str, e: tokio_postgres::Error) -> StrataError {
    tracing::error!(operation, error = %e, "postgres operation failed");
    StrataError::Storage {
        operation,
        source: Box::new(e),
    }
}
