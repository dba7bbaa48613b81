//! Server orchestrator.
//!
//! Owns the storage backend, the configuration, the token codec and the grant
//! processors. Token requests move through `received -> client authenticated ->
//! grant validated -> tokens issued`, stopping at the first failure.

mod authorize;
mod client_auth;
mod resource;
pub mod routes;

pub use authorize::{AuthorizeRequest, ResponseType};

use std::net::SocketAddr;
use std::sync::Arc;

use crate::codec::TokenCodec;
use crate::config::Config;
use crate::error::{ErrorCode, GrantResult, OAuthError, SetupError};
use crate::grant::{self, GrantContext, GrantHandler, TokenOutcome};
use crate::http::{Request, Response, TokenPayload};
use crate::models::GrantType;
use crate::storage::Storage;

/// OAuth 2.0 authorization server.
pub struct Server {
    storage: Arc<dyn Storage>,
    config: Arc<Config>,
    codec: TokenCodec,
    grants: Vec<Box<dyn GrantHandler>>,
}

impl Server {
    /// Create a server over `storage`.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the codec keys cannot be set up.
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Result<Self, SetupError> {
        config.validate()?;
        let codec = TokenCodec::new(&config)?;
        Ok(Self {
            storage,
            config: Arc::new(config),
            codec,
            grants: grant::register_all_grants(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    #[must_use]
    pub const fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Get the processor for a grant type.
    #[must_use]
    pub fn get_grant(&self, grant_type: GrantType) -> Option<&dyn GrantHandler> {
        self.grants.iter().find(|g| g.grant_type() == grant_type).map(|g| g.as_ref())
    }

    fn context(&self) -> GrantContext<'_> {
        GrantContext { storage: self.storage.as_ref(), config: &self.config, codec: &self.codec }
    }

    /// Process a token endpoint request.
    pub async fn grant_access_token(&self, request: &Request) -> TokenOutcome {
        let outcome = TokenOutcome::from(self.run_grant(request).await);
        match &outcome {
            TokenOutcome::Success(_) => {}
            TokenOutcome::ProtocolError(err) => {
                tracing::debug!(error = %err.code, description = %err.description, "Token request rejected");
            }
            TokenOutcome::ServerFault(cause) => {
                tracing::error!(error = %cause, "Token request failed");
            }
        }
        outcome
    }

    async fn run_grant(&self, request: &Request) -> GrantResult<TokenPayload> {
        if !request.is_post() {
            return Err(OAuthError::invalid_request(
                "The request method must be POST when requesting an access token",
            )
            .into());
        }
        if let Some(name) = request.repeated_parameter() {
            return Err(OAuthError::invalid_request(format!(
                "Parameter \"{name}\" was sent more than once"
            ))
            .into());
        }

        let raw_grant_type = request
            .body("grant_type")
            .ok_or_else(|| OAuthError::invalid_request("The grant type was not specified in the request"))?;
        let handler = GrantType::parse(raw_grant_type)
            .and_then(|grant_type| self.get_grant(grant_type))
            .ok_or_else(|| {
                OAuthError::new(
                    ErrorCode::UnsupportedGrantType,
                    format!("Grant type \"{raw_grant_type}\" not supported"),
                )
            })?;
        let grant_type = handler.grant_type();

        let client = client_auth::authenticate_client(self.storage.as_ref(), &self.config, request).await?;

        if !self.storage.check_restricted_grant_type(&client.client_id, grant_type).await? {
            return Err(OAuthError::unauthorized_client("The grant type is unauthorized for this client_id").into());
        }

        tracing::debug!(client_id = %client.client_id, grant_type = %grant_type, "Client authenticated");
        handler.grant(&self.context(), request, &client).await
    }

    /// Process a token endpoint request and render the response.
    pub async fn handle_token_request(&self, request: &Request) -> Response {
        let outcome = self.grant_access_token(request).await;
        if !request.is_post() {
            if let TokenOutcome::ProtocolError(err) = &outcome {
                return Response::error_with_status(405, err).with_header("Allow", "POST");
            }
        }
        outcome.into_response(&self.config.www_realm)
    }

    /// Run the server over HTTP until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn run_http(self: Arc<Self>, port: u16, options: routes::RouterOptions) -> anyhow::Result<()> {
        tracing::info!("Starting OAuth server in HTTP mode on port {}", port);
        tracing::info!("Registered {} grant types", self.grants.len());

        let router = routes::create_router(self, options);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("grants", &self.grants.iter().map(|g| g.grant_type()).collect::<Vec<_>>())
            .finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
