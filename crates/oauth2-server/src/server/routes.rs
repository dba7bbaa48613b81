//! HTTP transport: an axum router in front of [`Server`].

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use super::Server;
use crate::http::{Request, Response};

/// Default cap on requests handled at the same time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 256;

/// Router settings that belong to the host rather than the protocol.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Public base URL, used for the metadata document.
    pub base_url: String,
    /// Approve every authorization request as this user. Without it `/authorize`
    /// answers with the validated request for a consent page to render.
    pub approve_as: Option<String>,
    pub max_concurrency: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            approve_as: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Shared state for HTTP handlers.
struct HttpState {
    server: Arc<Server>,
    base_url: String,
    approve_as: Option<String>,
}

/// Create the HTTP router.
pub fn create_router(server: Arc<Server>, options: RouterOptions) -> Router {
    let state = Arc::new(HttpState {
        server,
        base_url: options.base_url.trim_end_matches('/').to_string(),
        approve_as: options.approve_as,
    });

    Router::new()
        .route("/health", get(health_check))
        .route("/.well-known/oauth-authorization-server", get(handle_metadata))
        .route("/token", any(handle_token))
        .route("/authorize", get(handle_authorize))
        .route("/resource", get(handle_resource))
        .layer(ConcurrencyLimitLayer::new(options.max_concurrency))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = axum::response::Response::builder().status(status);
        for (name, value) in self.headers() {
            builder = builder.header(name, value);
        }
        let body = self.body().map_or_else(Body::empty, |body| Body::from(body.to_string()));
        builder.body(body).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

fn to_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Request {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)));
    Request::from_parts(method.as_str(), uri.query(), headers, body)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "oauth2-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
async fn handle_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let config = state.server.config();

    let mut response_types = vec!["code"];
    let mut grant_types = vec!["authorization_code", "refresh_token"];
    if config.allow_implicit {
        response_types.push("token");
        grant_types.push("implicit");
    }

    let mut auth_methods = vec!["client_secret_basic"];
    if config.allow_credentials_in_request_body {
        auth_methods.push("client_secret_post");
    }
    if config.allow_public_clients {
        auth_methods.push("none");
    }

    Json(serde_json::json!({
        "issuer": state.base_url,
        "authorization_endpoint": format!("{}/authorize", state.base_url),
        "token_endpoint": format!("{}/token", state.base_url),
        "response_types_supported": response_types,
        "grant_types_supported": grant_types,
        "token_endpoint_auth_methods_supported": auth_methods,
        "code_challenge_methods_supported": ["S256", "plain"]
    }))
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// `POST /token`. Other methods are routed here too and answered with `405`.
async fn handle_token(
    State(state): State<Arc<HttpState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = to_request(&method, &uri, &headers, &body);
    state.server.handle_token_request(&request).await
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

/// `GET /authorize`
async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    let request = to_request(&method, &uri, &headers, &[]);

    if let Some(user_id) = state.approve_as.as_deref() {
        return state.server.handle_authorize_request(&request, true, Some(user_id)).await.into_response();
    }

    match state.server.validate_authorize_request(&request).await {
        Ok(authorize) => Json(authorize).into_response(),
        Err(response) => response.into_response(),
    }
}

// ─── Protected Resource ──────────────────────────────────────────────────────

/// `GET /resource`
async fn handle_resource(
    State(state): State<Arc<HttpState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    let request = to_request(&method, &uri, &headers, &[]);

    match state.server.verify_resource_request(&request, None).await {
        Ok(token) => Json(serde_json::json!({
            "client_id": token.client_id,
            "user_id": token.user_id,
            "scope": token.scope.to_option_string(),
            "expires": token.expires
        }))
        .into_response(),
        Err(response) => response.into_response(),
    }
}
