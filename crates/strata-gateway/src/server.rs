// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Routes, middleware, and shared state. The storage backend and the
//! serving client are injected at construction; handlers only ever see
//! the trait object.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use strata_config::ServerSettings;
use strata_core::{Storage, StrataError};
use strata_serving::ServingClient;

use crate::handlers;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The selected storage backend.
    pub storage: Arc<dyn Storage>,
    /// Client for the remote model-serving API.
    pub serving: Arc<ServingClient>,
    /// Resolve header-less requests to the fixed developer identity.
    pub dev_user: bool,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/api/me", get(handlers::get_me))
        .route("/api/domains", get(handlers::get_domains).post(handlers::create_domain))
        .route("/api/domains/{id}", put(handlers::update_domain).delete(handlers::delete_domain))
        .route("/api/sites", get(handlers::get_sites))
        .route("/api/endpoints", get(handlers::get_endpoints).post(handlers::create_endpoint))
        .route("/api/endpoints/refresh", post(handlers::refresh_endpoints))
        .route(
            "/api/endpoints/{id}",
            put(handlers::update_endpoint).delete(handlers::delete_endpoint),
        )
        .route("/api/conversations", get(handlers::get_conversations))
        .route(
            "/api/conversations/{id}",
            get(handlers::get_conversation)
                .put(handlers::update_conversation)
                .delete(handlers::delete_conversation),
        )
        .route("/api/chat", post(handlers::chat))
        .route("/api/config", get(handlers::get_config).post(handlers::set_config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn start_server(
    settings: &ServerSettings,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), StrataError> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StrataError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| StrataError::Internal(format!("gateway server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use strata_config::WorkspaceSettings;
    use strata_storage::MemoryStorage;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state() -> AppState {
        let serving = Arc::new(ServingClient::new(&WorkspaceSettings::default()).unwrap());
        AppState {
            storage: Arc::new(MemoryStorage::new(serving.clone())),
            serving,
            dev_user: false,
        }
    }

    fn state_against(base: &str) -> AppState {
        let serving = Arc::new(
            ServingClient::new(&WorkspaceSettings {
                host: Some(base.to_string()),
                token: Some("tok".into()),
                ..Default::default()
            })
            .unwrap(),
        );
        AppState {
            storage: Arc::new(MemoryStorage::new(serving.clone())),
            serving,
            dev_user: false,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let response = router(test_state()).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn domains_listing_returns_seeded_set() {
        let response = router(test_state())
            .oneshot(get("/api/domains"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn unknown_conversation_is_404_with_error_body() {
        let response = router(test_state())
            .oneshot(get("/api/conversations/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn endpoints_listing_always_has_a_default() {
        let app = router(test_state());

        // Remove the only seeded default; the listing must still flag
        // one of the remaining endpoints.
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/endpoints/dbrx-instruct")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/api/endpoints")).await.unwrap();
        let json = body_json(response).await;
        let endpoints = json.as_array().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().any(|e| e["isDefault"] == true));
    }

    #[tokio::test]
    async fn chat_without_serving_config_returns_canned_reply() {
        let response = router(test_state())
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"message": "Hello", "endpointId": "dbrx-instruct"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["message"]["role"], "assistant");
        assert!(
            json["message"]["content"]
                .as_str()
                .unwrap()
                .contains("canned response")
        );
        assert!(json["conversationId"].as_str().is_some());
    }

    #[tokio::test]
    async fn chat_persists_both_turns() {
        let state = test_state();
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"message": "Hello", "endpointId": "dbrx-instruct"}),
            ))
            .await
            .unwrap();
        let json = body_json(response).await;
        let conversation_id = json["conversationId"].as_str().unwrap();

        let stored = state
            .storage
            .get_conversation(conversation_id)
            .await
            .unwrap()
            .expect("conversation persisted");
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[0].role, strata_core::MessageRole::User);
        assert_eq!(stored.messages[1].role, strata_core::MessageRole::Assistant);
        assert_eq!(stored.title, "Hello");
    }

    #[tokio::test]
    async fn chat_uses_live_serving_endpoint_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/serving-endpoints/dbrx-instruct/invocations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "live reply"}}]
            })))
            .mount(&server)
            .await;

        let response = router(state_against(&server.uri()))
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"message": "Hello", "endpointId": "dbrx-instruct"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["message"]["content"], "live reply");
    }

    #[tokio::test]
    async fn chat_falls_back_to_canned_reply_when_invocation_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/serving-endpoints/dbrx-instruct/invocations"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let response = router(state_against(&server.uri()))
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"message": "Hello", "endpointId": "dbrx-instruct"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(
            json["message"]["content"]
                .as_str()
                .unwrap()
                .contains("canned response")
        );
    }

    #[tokio::test]
    async fn chat_rejects_empty_messages() {
        let response = router(test_state())
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"message": "   ", "endpointId": "dbrx-instruct"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn me_reflects_forwarded_identity_headers() {
        let request = Request::builder()
            .uri("/api/me")
            .header("x-forwarded-email", "jane.doe@example.com")
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["email"], "jane.doe@example.com");
        assert_eq!(json["displayName"], "Jane Doe");
        assert_eq!(json["isAuthenticated"], true);

        let response = router(test_state()).oneshot(get("/api/me")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["isAuthenticated"], false);
    }

    #[tokio::test]
    async fn config_roundtrips_through_the_api() {
        let state = test_state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/config",
                serde_json::json!({"defaultEndpointId": "llama-3-70b"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/config")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["defaultEndpointId"], "llama-3-70b");
    }
}
