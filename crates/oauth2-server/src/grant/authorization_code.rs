//! `authorization_code` grant (RFC 6749 §4.1.3).

use async_trait::async_trait;

use crate::error::{ErrorCode, GrantResult, OAuthError};
use crate::http::{Request, TokenPayload};
use crate::models::{Client, CodeChallengeMethod, GrantType, redirect_uri_matches};

use super::{GrantContext, GrantHandler, issue_tokens, narrow_scope, pkce};

const INVALID_CODE: &str = "Authorization code doesn't exist or is invalid for the client";

/// Exchanges a single-use authorization code for tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorizationCodeGrant;

#[async_trait]
impl GrantHandler for AuthorizationCodeGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::AuthorizationCode
    }

    async fn grant(
        &self,
        ctx: &GrantContext<'_>,
        request: &Request,
        client: &Client,
    ) -> GrantResult<TokenPayload> {
        let presented = request.body("code").ok_or_else(|| OAuthError::missing_parameter("code"))?;

        let stored_key = ctx.codec.to_stored(presented)?;
        let record = ctx
            .storage
            .get_authorization_code(&stored_key)
            .await?
            .filter(|record| ctx.codec.matches_stored(&record.code, presented))
            .ok_or_else(|| OAuthError::invalid_grant(INVALID_CODE))?;

        if record.client_id != client.client_id {
            return Err(OAuthError::invalid_grant(INVALID_CODE).into());
        }

        if let Some(recorded) = record.redirect_uri.as_deref() {
            let exact = ctx.config.require_exact_redirect_uri;
            let matches = match request.body("redirect_uri") {
                Some(supplied) => redirect_uri_matches(recorded, supplied, exact),
                None => !exact,
            };
            if !matches {
                return Err(OAuthError::new(
                    ErrorCode::RedirectUriMismatch,
                    "The redirect URI is missing or does not match",
                )
                .into());
            }
        }

        if let Some(challenge) = record.code_challenge.as_deref() {
            let verifier = request
                .body("code_verifier")
                .ok_or_else(|| OAuthError::invalid_grant("The PKCE code verifier parameter is required"))?;
            let method = record.code_challenge_method.unwrap_or(CodeChallengeMethod::Plain);
            if !pkce::verify(method, verifier, challenge) {
                return Err(OAuthError::invalid_grant("The PKCE code verifier parameter is invalid").into());
            }
        }

        let scope = narrow_scope(request, &record.scope)?;

        // Single use: a concurrent redemption of the same code loses here.
        if !ctx.storage.mark_authorization_code_used(&record.code).await? {
            tracing::warn!(client_id = %client.client_id, "Authorization code already redeemed");
            return Err(OAuthError::invalid_grant(INVALID_CODE).into());
        }

        let refresh_scope = (ctx.config.issue_refresh_token
            && client.allows_grant_type(GrantType::RefreshToken))
        .then_some(&record.scope);

        let payload =
            issue_tokens(ctx, &client.client_id, record.user_id.as_deref(), &scope, refresh_scope)
                .await?;

        tracing::info!(
            client_id = %client.client_id,
            scope = %scope,
            refresh = payload.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(payload)
    }
}
