// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the workspace model-serving API.
//!
//! Owns the OAuth client-credential exchange and caches the resulting
//! bearer token for the life of the process. A per-call user token
//! always takes precedence over the service credential.
//!
//! Every transport failure, non-200 status, or unusable body surfaces
//! as [`StrataError::RemoteUnavailable`]; callers fall back to cached
//! local state or a canned response rather than failing the request.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use strata_config::WorkspaceSettings;
use strata_core::{Endpoint, EndpointType, StrataError};

use crate::classify::classify;
use crate::types::{
    ChatMessage, DatabaseCredential, EndpointDescriptor, ListEndpointsResponse, TokenResponse,
};

/// Returned when an invocation response carries no recognizable text.
pub const FALLBACK_REPLY: &str = "I received your message but couldn't generate a response.";

const INVOKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for listing and invoking model-serving endpoints.
pub struct ServingClient {
    http: reqwest::Client,
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    static_token: Option<String>,
    /// Service-principal bearer token, exchanged lazily and kept until
    /// process restart.
    cached_token: OnceCell<String>,
}

impl ServingClient {
    pub fn new(settings: &WorkspaceSettings) -> Result<Self, StrataError> {
        let http = reqwest::Client::builder()
            .timeout(INVOKE_TIMEOUT)
            .build()
            .map_err(|e| StrataError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: settings.base_url(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            static_token: settings.token.clone(),
            cached_token: OnceCell::new(),
        })
    }

    /// Whether the client can authenticate without a per-call token.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
            && (self.static_token.is_some()
                || (self.client_id.is_some() && self.client_secret.is_some()))
    }

    fn base_url(&self) -> Result<&str, StrataError> {
        self.base_url
            .as_deref()
            .ok_or_else(|| StrataError::ConfigurationMissing("workspace host".into()))
    }

    /// The service-principal token: the static token when configured,
    /// otherwise the cached client-credential exchange result.
    pub async fn service_token(&self) -> Result<String, StrataError> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }
        self.cached_token
            .get_or_try_init(|| self.exchange_client_credentials())
            .await
            .map(|token| token.clone())
    }

    async fn exchange_client_credentials(&self) -> Result<String, StrataError> {
        let base = self.base_url()?;
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(StrataError::ConfigurationMissing(
                    "workspace OAuth client credentials".into(),
                ));
            }
        };

        let response = self
            .http
            .post(format!("{base}/oidc/v1/token"))
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")])
            .send()
            .await
            .map_err(|e| remote_err("token exchange request failed", Some(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote_status_err("token exchange", status));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| remote_err("token exchange returned unusable body", Some(e)))?;
        debug!("service-principal token acquired");
        Ok(token.access_token)
    }

    /// Bearer token for a call: the user's own token when supplied,
    /// else the service credential.
    async fn bearer(&self, user_token: Option<&str>) -> Result<String, StrataError> {
        match user_token {
            Some(token) => Ok(token.to_string()),
            None => self.service_token().await,
        }
    }

    async fn fetch_descriptors(
        &self,
        user_token: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Vec<EndpointDescriptor>, StrataError> {
        let base = self.base_url()?;
        let token = self.bearer(user_token).await?;

        let mut request = self
            .http
            .get(format!("{base}/api/2.0/serving-endpoints"))
            .bearer_auth(token);
        if let Some(filter) = filter {
            request = request.query(&[("filter", filter)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| remote_err("endpoint listing request failed", Some(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote_status_err("endpoint listing", status));
        }

        let listing: ListEndpointsResponse = response
            .json()
            .await
            .map_err(|e| remote_err("endpoint listing returned unusable body", Some(e)))?;
        Ok(listing.endpoints)
    }

    /// List serving endpoints, classified and with the first entry
    /// marked as the default.
    pub async fn list_endpoints(
        &self,
        user_token: Option<&str>,
    ) -> Result<Vec<Endpoint>, StrataError> {
        let descriptors = self.fetch_descriptors(user_token, None).await?;
        Ok(descriptors
            .iter()
            .enumerate()
            .map(|(i, descriptor)| to_endpoint(descriptor, i == 0))
            .collect())
    }

    /// List only agent-typed endpoints.
    pub async fn list_agents(
        &self,
        user_token: Option<&str>,
    ) -> Result<Vec<Endpoint>, StrataError> {
        let descriptors = self.fetch_descriptors(user_token, None).await?;
        Ok(descriptors
            .iter()
            .filter(|d| classify(d) == EndpointType::Agent)
            .map(|descriptor| to_endpoint(descriptor, false))
            .collect())
    }

    /// List the workspace's hosted foundation-model APIs.
    pub async fn list_foundation_model_apis(
        &self,
        user_token: Option<&str>,
    ) -> Result<Vec<Endpoint>, StrataError> {
        let descriptors = self
            .fetch_descriptors(user_token, Some("foundation_model_apis"))
            .await?;
        Ok(descriptors
            .iter()
            .map(|descriptor| Endpoint {
                id: descriptor.name.clone(),
                name: descriptor.name.clone(),
                description: format!("Foundation Model API: {}", descriptor.name),
                endpoint_type: EndpointType::Foundation,
                is_default: false,
                domain_id: None,
            })
            .collect())
    }

    /// Invoke a named endpoint with a chat transcript and return the
    /// extracted reply text.
    ///
    /// Extraction falls back through chat-completion
    /// `choices[0].message.content`, then legacy `predictions[0]`, then
    /// [`FALLBACK_REPLY`].
    pub async fn invoke(
        &self,
        endpoint_name: &str,
        messages: &[ChatMessage],
        user_token: Option<&str>,
    ) -> Result<String, StrataError> {
        let base = self.base_url()?;
        let token = self.bearer(user_token).await?;

        let response = self
            .http
            .post(format!("{base}/serving-endpoints/{endpoint_name}/invocations"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "messages": messages }))
            .send()
            .await
            .map_err(|e| remote_err("invocation request failed", Some(e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = endpoint_name, status = %status, "invocation rejected");
            return Err(remote_status_err("invocation", status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| remote_err("invocation returned unusable body", Some(e)))?;
        Ok(extract_reply(&body).unwrap_or_else(|| FALLBACK_REPLY.to_string()))
    }

    /// Mint a short-lived database access token for a managed database
    /// instance, authenticating with the service credential.
    pub async fn mint_database_credential(
        &self,
        instance_name: &str,
    ) -> Result<String, StrataError> {
        let base = self.base_url()?;
        let token = self.service_token().await?;

        let response = self
            .http
            .post(format!("{base}/api/2.0/database/credentials"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "instance_names": [instance_name] }))
            .send()
            .await
            .map_err(|e| remote_err("database credential request failed", Some(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote_status_err("database credential minting", status));
        }

        let credential: DatabaseCredential = response
            .json()
            .await
            .map_err(|e| remote_err("database credential returned unusable body", Some(e)))?;
        Ok(credential.token)
    }
}

/// Map a descriptor to the entity model, synthesizing a description
/// from the classified type and readiness.
fn to_endpoint(descriptor: &EndpointDescriptor, is_default: bool) -> Endpoint {
    let endpoint_type = classify(descriptor);
    let mut description = match endpoint_type {
        EndpointType::Agent => format!("AI Agent: {}", descriptor.name),
        EndpointType::Foundation => format!("Foundation model: {}", descriptor.name),
        EndpointType::Custom => format!("Custom model: {}", descriptor.name),
    };
    if !descriptor.is_ready() {
        description.push_str(" (not ready)");
    }

    Endpoint {
        id: descriptor.name.clone(),
        name: descriptor.name.clone(),
        description,
        endpoint_type,
        is_default,
        domain_id: None,
    }
}

/// Pull reply text out of an invocation response body. Empty strings
/// count as absent so the next extraction step gets its chance.
fn extract_reply(body: &Value) -> Option<String> {
    let from_choices = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    if let Some(content) = from_choices {
        return Some(content.to_string());
    }

    body.pointer("/predictions/0")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn remote_err(
    message: &str,
    source: Option<impl std::error::Error + Send + Sync + 'static>,
) -> StrataError {
    StrataError::RemoteUnavailable {
        message: message.to_string(),
        source: source.map(|e| Box::new(e) as _),
    }
}

fn remote_status_err(operation: &str, status: StatusCode) -> StrataError {
    StrataError::RemoteUnavailable {
        message: format!("{operation} returned {status}"),
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::MessageRole;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with_credentials(base: &str) -> ServingClient {
        ServingClient::new(&WorkspaceSettings {
            host: Some(base.to_string()),
            client_id: Some("svc-id".into()),
            client_secret: Some("svc-secret".into()),
            ..Default::default()
        })
        .unwrap()
    }

    fn client_with_token(base: &str) -> ServingClient {
        ServingClient::new(&WorkspaceSettings {
            host: Some(base.to_string()),
            token: Some("static-token".into()),
            ..Default::default()
        })
        .unwrap()
    }

    async fn mount_token_endpoint(server: &MockServer, expect: u64) {
        Mock::given(method("POST"))
            .and(path("/oidc/v1/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("scope=all-apis"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "exchanged-token"})),
            )
            .expect(expect)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn client_credential_exchange_is_cached_across_calls() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/serving-endpoints"))
            .and(header("authorization", "Bearer exchanged-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"endpoints": []})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = client_with_credentials(&server.uri());
        client.list_endpoints(None).await.unwrap();
        client.list_endpoints(None).await.unwrap();
    }

    #[tokio::test]
    async fn static_token_short_circuits_the_exchange() {
        let server = MockServer::start().await;

        // No token endpoint mounted: an exchange attempt would 404.
        Mock::given(method("GET"))
            .and(path("/api/2.0/serving-endpoints"))
            .and(header("authorization", "Bearer static-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"endpoints": []})),
            )
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        assert!(client.is_configured());
        assert!(client.list_endpoints(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_token_overrides_service_credential() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/serving-endpoints"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"endpoints": []})),
            )
            .mount(&server)
            .await;

        let client = client_with_credentials(&server.uri());
        client.list_endpoints(Some("user-token")).await.unwrap();
    }

    #[tokio::test]
    async fn listing_classifies_and_marks_first_default() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/serving-endpoints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "endpoints": [
                    {"name": "llama-3-70b", "state": {"ready": "READY"}},
                    {"name": "support-agent"},
                    {"name": "custom-router", "state": {"ready": "READY"}}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        let endpoints = client.list_endpoints(None).await.unwrap();
        assert_eq!(endpoints.len(), 3);

        assert_eq!(endpoints[0].endpoint_type, EndpointType::Foundation);
        assert!(endpoints[0].is_default);
        assert_eq!(endpoints[0].description, "Foundation model: llama-3-70b");

        assert_eq!(endpoints[1].endpoint_type, EndpointType::Agent);
        assert!(!endpoints[1].is_default);
        assert_eq!(endpoints[1].description, "AI Agent: support-agent (not ready)");

        assert_eq!(endpoints[2].endpoint_type, EndpointType::Custom);
        assert_eq!(endpoints[2].description, "Custom model: custom-router");
    }

    #[tokio::test]
    async fn list_agents_filters_to_agent_type() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/serving-endpoints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "endpoints": [
                    {"name": "llama-3-70b"},
                    {"name": "support-agent"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        let agents = client.list_agents(None).await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, "support-agent");
        assert!(!agents[0].is_default);
    }

    #[tokio::test]
    async fn foundation_model_listing_uses_filter_param() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/serving-endpoints"))
            .and(query_param("filter", "foundation_model_apis"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "endpoints": [{"name": "hosted-embeddings"}]
            })))
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        let apis = client.list_foundation_model_apis(None).await.unwrap();
        assert_eq!(apis.len(), 1);
        assert_eq!(apis[0].endpoint_type, EndpointType::Foundation);
        assert_eq!(apis[0].description, "Foundation Model API: hosted-embeddings");
    }

    #[tokio::test]
    async fn invoke_extracts_chat_completion_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/serving-endpoints/llama-3-70b/invocations"))
            .and(header("authorization", "Bearer static-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello there"}}]
            })))
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        let reply = client
            .invoke(
                "llama-3-70b",
                &[ChatMessage::new(MessageRole::User, "Hi")],
                None,
            )
            .await
            .unwrap();
        assert_eq!(reply, "Hello there");
    }

    #[tokio::test]
    async fn invoke_falls_back_to_predictions_then_placeholder() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/serving-endpoints/legacy/invocations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "predictions": ["legacy reply"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/serving-endpoints/silent/invocations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": ""}}]
            })))
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        let messages = [ChatMessage::new(MessageRole::User, "Hi")];

        let reply = client.invoke("legacy", &messages, None).await.unwrap();
        assert_eq!(reply, "legacy reply");

        let reply = client.invoke("silent", &messages, None).await.unwrap();
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn invoke_surfaces_non_200_as_remote_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/serving-endpoints/broken/invocations"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        let err = client
            .invoke("broken", &[ChatMessage::new(MessageRole::User, "Hi")], None)
            .await
            .unwrap_err();
        assert!(err.is_remote_unavailable(), "got: {err}");
    }

    #[tokio::test]
    async fn mint_database_credential_returns_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.0/database/credentials"))
            .and(header("authorization", "Bearer static-token"))
            .and(body_string_contains("chat-db"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token": "db-token-1"})),
            )
            .mount(&server)
            .await;

        let client = client_with_token(&server.uri());
        let token = client.mint_database_credential("chat-db").await.unwrap();
        assert_eq!(token, "db-token-1");
    }

    #[tokio::test]
    async fn missing_credentials_fail_fast_without_network() {
        let client = ServingClient::new(&WorkspaceSettings {
            host: Some("https://example.cloud".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(!client.is_configured());

        let err = client.service_token().await.unwrap_err();
        assert!(matches!(err, StrataError::ConfigurationMissing(_)), "got: {err}");
    }

    #[test]
    fn extract_reply_prefers_choices_over_predictions() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "from chat"}}],
            "predictions": ["from legacy"]
        });
        assert_eq!(extract_reply(&body).as_deref(), Some("from chat"));
    }
}
