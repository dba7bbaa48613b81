//! Grant processors for the token endpoint.
//!
//! Each processor runs after the orchestrator has authenticated the client and
//! checked that it may use the grant type. A processor validates its own
//! parameters in a fixed order, stops at the first failure, and either persists a
//! complete token set or nothing.

mod authorization_code;
mod issue;
pub mod pkce;
mod refresh_token;

pub use authorization_code::AuthorizationCodeGrant;
pub use issue::issue_tokens;
pub use refresh_token::RefreshTokenGrant;

use async_trait::async_trait;

use crate::codec::TokenCodec;
use crate::config::Config;
use crate::error::{GrantError, GrantResult, OAuthError};
use crate::http::{Request, Response, TokenPayload};
use crate::models::{Client, GrantType, Scope};
use crate::storage::Storage;

/// Server-wide collaborators handed to every grant processor.
#[derive(Clone, Copy)]
pub struct GrantContext<'a> {
    pub storage: &'a dyn Storage,
    pub config: &'a Config,
    pub codec: &'a TokenCodec,
}

/// A token endpoint grant type.
#[async_trait]
pub trait GrantHandler: Send + Sync {
    /// The `grant_type` value this processor answers to.
    fn grant_type(&self) -> GrantType;

    /// Validate the grant for an authenticated `client` and issue tokens.
    async fn grant(
        &self,
        ctx: &GrantContext<'_>,
        request: &Request,
        client: &Client,
    ) -> GrantResult<TokenPayload>;
}

/// Create the processors for every supported grant type.
#[must_use]
pub fn register_all_grants() -> Vec<Box<dyn GrantHandler>> {
    vec![Box::new(AuthorizationCodeGrant), Box::new(RefreshTokenGrant)]
}

/// Result of a token request.
#[derive(Debug)]
pub enum TokenOutcome {
    /// Tokens were issued and persisted.
    Success(TokenPayload),
    /// The request was rejected; shown to the client as-is.
    ProtocolError(OAuthError),
    /// Storage or codec failure; shown to the client only as `server_error`.
    ServerFault(GrantError),
}

impl TokenOutcome {
    /// Render the outcome. `realm` names the `WWW-Authenticate` challenge sent
    /// with `401` responses.
    #[must_use]
    pub fn into_response(self, realm: &str) -> Response {
        match self {
            Self::Success(payload) => Response::token(&payload),
            Self::ProtocolError(err) => {
                let response = Response::error(&err);
                if response.status() == 401 {
                    response.with_challenge("Basic", realm, None)
                } else {
                    response
                }
            }
            Self::ServerFault(_) => Response::error(&OAuthError::server_error()),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The protocol error, if the request was rejected.
    #[must_use]
    pub const fn protocol_error(&self) -> Option<&OAuthError> {
        match self {
            Self::ProtocolError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GrantResult<TokenPayload>> for TokenOutcome {
    fn from(result: GrantResult<TokenPayload>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(GrantError::Protocol(err)) => Self::ProtocolError(err),
            Err(fault) => Self::ServerFault(fault),
        }
    }
}

impl From<OAuthError> for TokenOutcome {
    fn from(err: OAuthError) -> Self {
        Self::ProtocolError(err)
    }
}

/// Resolve the optional `scope` parameter against the scope that was granted.
///
/// Without a `scope` parameter (or with a blank one) the granted scope is kept;
/// otherwise the request must name a subset of it.
fn narrow_scope(request: &Request, granted: &Scope) -> GrantResult<Scope> {
    let Some(raw) = request.body("scope").filter(|raw| !raw.trim().is_empty()) else {
        return Ok(granted.clone());
    };
    match Scope::parse_strict(raw) {
        Some(requested) if requested.is_subset_of(granted) => Ok(requested),
        _ => Err(OAuthError::invalid_scope("The scope requested is invalid for this request").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, StorageError};

    #[test]
    fn test_narrow_scope() {
        let granted = Scope::parse("read write");
        let same = narrow_scope(&Request::post(), &granted).unwrap();
        assert_eq!(same, granted);

        let narrowed = narrow_scope(&Request::post().with_body("scope", "read"), &granted).unwrap();
        assert_eq!(narrowed, Scope::parse("read"));

        let err = narrow_scope(&Request::post().with_body("scope", "admin"), &granted).unwrap_err();
        assert_eq!(err.to_oauth_error().code, ErrorCode::InvalidScope);
    }

    #[test]
    fn test_blank_scope_keeps_granted() {
        let granted = Scope::parse("read write");
        for blank in [" ", "   ", "\t"] {
            let scope = narrow_scope(&Request::post().with_body("scope", blank), &granted).unwrap();
            assert_eq!(scope, granted);
        }
    }

    #[test]
    fn test_outcome_from_result() {
        let outcome = TokenOutcome::from(Err::<TokenPayload, _>(GrantError::from(
            StorageError::backend("disk full"),
        )));
        assert!(matches!(outcome, TokenOutcome::ServerFault(_)));
        let response = outcome.into_response("Service");
        assert_eq!(response.status(), 500);
        assert_eq!(response.parameter("error"), Some("server_error"));
    }

    #[test]
    fn test_invalid_client_carries_challenge() {
        let outcome = TokenOutcome::from(OAuthError::invalid_client("bad"));
        let response = outcome.into_response("Service");
        assert_eq!(response.status(), 401);
        assert_eq!(response.header("WWW-Authenticate"), Some("Basic realm=\"Service\""));
    }

    #[test]
    fn test_registered_grants() {
        let types: Vec<_> = register_all_grants().iter().map(|g| g.grant_type()).collect();
        assert_eq!(types, vec![GrantType::AuthorizationCode, GrantType::RefreshToken]);
    }
}
