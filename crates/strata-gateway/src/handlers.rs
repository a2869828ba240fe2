// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the Strata REST API.
//!
//! Thin glue over the storage contract and the serving client. The one
//! handler with real orchestration is [`chat`]: it resolves reference
//! data, persists the user turn, invokes the model, and always
//! produces an assistant turn, falling back to a canned reply when the
//! remote is unreachable.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use strata_core::{
    AppConfig, Conversation, ConversationUpdate, Domain, DomainUpdate, Endpoint,
    EndpointUpdate, InsertDomain, InsertEndpoint, InsertMessage, Message, MessageRole, Site,
    StrataError, UserContext,
};
use strata_serving::ChatMessage;

use crate::context::resolve_user;
use crate::mock::generate_mock_response;
use crate::server::AppState;

/// Maximum characters of the first message used as a conversation title.
const TITLE_LEN: usize = 50;

/// Error payload returned on every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wrapper turning [`StrataError`] into an HTTP response.
pub struct ApiError(StrataError);

impl From<StrataError> for ApiError {
    fn from(err: StrataError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = if self.0.is_not_found() {
            (StatusCode::NOT_FOUND, self.0.to_string())
        } else {
            // Internals are logged with context, not leaked to clients.
            error!(error = %self.0, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

fn not_found(entity: &'static str, id: &str) -> ApiError {
    ApiError(StrataError::not_found(entity, id))
}

// --- Domains ---

pub async fn get_domains(State(state): State<AppState>) -> Result<Json<Vec<Domain>>, ApiError> {
    Ok(Json(state.storage.get_domains().await?))
}

pub async fn create_domain(
    State(state): State<AppState>,
    Json(domain): Json<InsertDomain>,
) -> Result<(StatusCode, Json<Domain>), ApiError> {
    let created = state.storage.create_domain(domain).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_domain(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<DomainUpdate>,
) -> Result<Json<Domain>, ApiError> {
    match state.storage.update_domain(&id, updates).await? {
        Some(domain) => Ok(Json(domain)),
        None => Err(not_found("domain", &id)),
    }
}

pub async fn delete_domain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.storage.delete_domain(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("domain", &id))
    }
}

// --- Sites ---

pub async fn get_sites(State(state): State<AppState>) -> Result<Json<Vec<Site>>, ApiError> {
    Ok(Json(state.storage.get_sites().await?))
}

// --- Endpoints ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointsQuery {
    #[serde(default)]
    pub domain_id: Option<String>,
}

/// List endpoints for a domain filter. A non-empty response always
/// carries at least one default so the client has something to select.
pub async fn get_endpoints(
    State(state): State<AppState>,
    Query(query): Query<EndpointsQuery>,
) -> Result<Json<Vec<Endpoint>>, ApiError> {
    let mut endpoints = state
        .storage
        .get_endpoints(query.domain_id.as_deref())
        .await?;
    if !endpoints.is_empty() && !endpoints.iter().any(|e| e.is_default) {
        endpoints[0].is_default = true;
    }
    Ok(Json(endpoints))
}

pub async fn refresh_endpoints(
    State(state): State<AppState>,
) -> Result<Json<Vec<Endpoint>>, ApiError> {
    Ok(Json(state.storage.refresh_endpoints_from_remote().await?))
}

pub async fn create_endpoint(
    State(state): State<AppState>,
    Json(endpoint): Json<InsertEndpoint>,
) -> Result<(StatusCode, Json<Endpoint>), ApiError> {
    let created = state.storage.create_endpoint(endpoint).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<EndpointUpdate>,
) -> Result<Json<Endpoint>, ApiError> {
    match state.storage.update_endpoint(&id, updates).await? {
        Some(endpoint) => Ok(Json(endpoint)),
        None => Err(not_found("endpoint", &id)),
    }
}

pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.storage.delete_endpoint(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("endpoint", &id))
    }
}

// --- Conversations ---

/// List conversations. Authenticated users see their own; anonymous
/// requests see the full listing.
pub async fn get_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let ctx = resolve_user(&headers, state.dev_user);
    let conversations = state
        .storage
        .get_conversations(ctx.email.as_deref())
        .await?;
    Ok(Json(conversations))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    match state.storage.get_conversation(&id).await? {
        Some(conversation) => Ok(Json(conversation)),
        None => Err(not_found("conversation", &id)),
    }
}

pub async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<ConversationUpdate>,
) -> Result<Json<Conversation>, ApiError> {
    match state.storage.update_conversation(&id, updates).await? {
        Some(conversation) => Ok(Json(conversation)),
        None => Err(not_found("conversation", &id)),
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if state.storage.delete_conversation(&id).await? {
        Ok(Json(DeleteResponse { success: true }))
    } else {
        Err(not_found("conversation", &id))
    }
}

// --- Chat ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub endpoint_id: String,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: Message,
    pub conversation_id: String,
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if request.message.trim().is_empty() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "message must not be empty".to_string(),
            }),
        )
            .into_response());
    }

    let ctx = resolve_user(&headers, state.dev_user);
    let storage = &state.storage;

    let endpoint = storage.get_endpoint(&request.endpoint_id).await?;
    let domain = storage
        .get_domain(request.domain_id.as_deref().unwrap_or("generic"))
        .await?;
    let site = storage
        .get_site(request.site_id.as_deref().unwrap_or("all-sites"))
        .await?;

    let conversation = match &request.conversation_id {
        Some(id) => storage
            .get_conversation(id)
            .await?
            .ok_or_else(|| not_found("conversation", id))?,
        None => {
            storage
                .create_conversation(
                    &request.endpoint_id,
                    &truncated_title(&request.message),
                    request.domain_id.as_deref(),
                    request.site_id.as_deref(),
                    ctx.email.as_deref(),
                )
                .await?
        }
    };

    // Snapshot history before this turn; the outgoing request carries
    // the new user message explicitly.
    let history: Vec<ChatMessage> = conversation
        .messages
        .iter()
        .map(|m| ChatMessage::new(m.role, m.content.clone()))
        .collect();

    storage
        .add_message(
            &conversation.id,
            InsertMessage {
                role: MessageRole::User,
                content: request.message.clone(),
                timestamp: now_millis(),
            },
        )
        .await?;

    let system_prompt = build_system_prompt(domain.as_ref(), site.as_ref());
    let mut outgoing = Vec::with_capacity(history.len() + 2);
    outgoing.push(ChatMessage::new(MessageRole::System, system_prompt));
    outgoing.extend(history.iter().cloned());
    outgoing.push(ChatMessage::new(MessageRole::User, request.message.clone()));

    let endpoint_name = endpoint
        .as_ref()
        .map(|e| e.name.clone())
        .unwrap_or_else(|| request.endpoint_id.clone());
    let domain_name = domain
        .as_ref()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| "General".to_string());
    let site_name = site
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "All Sites".to_string());

    let reply = if state.serving.is_configured() || ctx.access_token.is_some() {
        match state
            .serving
            .invoke(&request.endpoint_id, &outgoing, ctx.access_token.as_deref())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(endpoint = %request.endpoint_id, error = %e, "invocation failed, serving canned reply");
                generate_mock_response(
                    &request.message,
                    &endpoint_name,
                    &domain_name,
                    &site_name,
                    history.len(),
                )
            }
        }
    } else {
        generate_mock_response(
            &request.message,
            &endpoint_name,
            &domain_name,
            &site_name,
            history.len(),
        )
    };

    let assistant_message = storage
        .add_message(
            &conversation.id,
            InsertMessage {
                role: MessageRole::Assistant,
                content: reply,
                timestamp: now_millis(),
            },
        )
        .await?;

    Ok(Json(ChatResponse {
        message: assistant_message,
        conversation_id: conversation.id,
    })
    .into_response())
}

fn truncated_title(message: &str) -> String {
    let title: String = message.chars().take(TITLE_LEN).collect();
    if message.chars().count() > TITLE_LEN {
        format!("{title}...")
    } else {
        title
    }
}

fn build_system_prompt(domain: Option<&Domain>, site: Option<&Site>) -> String {
    let base = domain
        .map(|d| d.system_prompt.clone())
        .unwrap_or_else(|| "You are a helpful AI assistant.".to_string());
    match site {
        Some(site) if site.id != "all-sites" => format!(
            "{base} Focus on data and context specific to {} ({}).",
            site.name, site.location
        ),
        _ => base,
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// --- Config ---

pub async fn get_config(State(state): State<AppState>) -> Result<Json<AppConfig>, ApiError> {
    Ok(Json(state.storage.get_config().await?))
}

pub async fn set_config(
    State(state): State<AppState>,
    Json(config): Json<AppConfig>,
) -> Result<Json<AppConfig>, ApiError> {
    Ok(Json(state.storage.set_config(config).await?))
}

// --- Identity & liveness ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserContext,
    pub is_authenticated: bool,
}

pub async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> Json<MeResponse> {
    let user = resolve_user(&headers, state.dev_user);
    let is_authenticated = user.is_authenticated();
    Json(MeResponse {
        user,
        is_authenticated,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_truncate_at_fifty_chars_with_ellipsis() {
        assert_eq!(truncated_title("Hello"), "Hello");

        let long = "x".repeat(80);
        let title = truncated_title(&long);
        assert_eq!(title.chars().count(), TITLE_LEN + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn system_prompt_adds_site_focus_except_for_all_sites() {
        let domain = Domain {
            id: "mining-ops".into(),
            name: "Mining Operations".into(),
            description: "".into(),
            system_prompt: "You are an ops specialist.".into(),
            icon: None,
        };
        let site = Site {
            id: "redhill".into(),
            name: "Red Hill".into(),
            location: "Atacama, Chile".into(),
            kind: "Copper".into(),
        };
        let prompt = build_system_prompt(Some(&domain), Some(&site));
        assert!(prompt.starts_with("You are an ops specialist."));
        assert!(prompt.contains("Red Hill (Atacama, Chile)"));

        let all_sites = Site {
            id: "all-sites".into(),
            name: "All Sites".into(),
            location: "Global".into(),
            kind: "Corporate".into(),
        };
        let prompt = build_system_prompt(Some(&domain), Some(&all_sites));
        assert_eq!(prompt, "You are an ops specialist.");

        let prompt = build_system_prompt(None, None);
        assert_eq!(prompt, "You are a helpful AI assistant.");
    }

    #[test]
    fn chat_request_accepts_minimal_payload() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message": "Hi", "endpointId": "llama-3-70b"}"#).unwrap();
        assert_eq!(request.message, "Hi");
        assert_eq!(request.endpoint_id, "llama-3-70b");
        assert!(request.conversation_id.is_none());
    }
}
