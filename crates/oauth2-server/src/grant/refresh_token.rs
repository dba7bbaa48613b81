//! `refresh_token` grant (RFC 6749 §6).

use async_trait::async_trait;

use crate::error::{GrantResult, OAuthError};
use crate::http::{Request, TokenPayload};
use crate::models::{Client, GrantType, RefreshToken};

use super::{GrantContext, GrantHandler, issue_tokens, narrow_scope};

const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Issues a new access token for a refresh token, rotating the refresh token
/// when `always_issue_new_refresh_token` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct RefreshTokenGrant;

#[async_trait]
impl GrantHandler for RefreshTokenGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::RefreshToken
    }

    async fn grant(
        &self,
        ctx: &GrantContext<'_>,
        request: &Request,
        client: &Client,
    ) -> GrantResult<TokenPayload> {
        let presented = request
            .body("refresh_token")
            .ok_or_else(|| OAuthError::missing_parameter("refresh_token"))?;

        let stored_key = ctx.codec.to_stored(presented)?;
        let record = ctx
            .storage
            .get_refresh_token(&stored_key)
            .await?
            .filter(|record| ctx.codec.matches_stored(&record.refresh_token, presented))
            .filter(|record| record.client_id == client.client_id)
            .ok_or_else(|| OAuthError::invalid_grant(INVALID_REFRESH_TOKEN))?;

        let scope = narrow_scope(request, &record.scope)?;

        let rotate = ctx.config.always_issue_new_refresh_token;
        if rotate || ctx.config.unset_refresh_token_after_use {
            // Consumed atomically so that two concurrent refreshes cannot both win.
            if !ctx.storage.unset_refresh_token(&record.refresh_token).await? {
                tracing::warn!(client_id = %client.client_id, "Refresh token already consumed");
                return Err(OAuthError::invalid_grant(INVALID_REFRESH_TOKEN).into());
            }
        }

        let issued = issue_tokens(
            ctx,
            &client.client_id,
            record.user_id.as_deref(),
            &scope,
            rotate.then_some(&record.scope),
        )
        .await;
        let payload = match issued {
            Ok(payload) => payload,
            Err(err) => {
                if rotate && !ctx.config.unset_refresh_token_after_use {
                    restore_refresh_token(ctx, record).await;
                }
                return Err(err);
            }
        };

        tracing::info!(
            client_id = %client.client_id,
            scope = %scope,
            rotated = rotate,
            "Refresh token exchanged"
        );
        Ok(payload)
    }
}

/// Put back a refresh token consumed by a rotation whose issuance failed.
async fn restore_refresh_token(ctx: &GrantContext<'_>, record: RefreshToken) {
    match ctx.storage.set_refresh_token(record).await {
        Ok(()) => tracing::debug!("Restored refresh token after failed rotation"),
        Err(err) => tracing::error!(error = %err, "Failed to restore refresh token"),
    }
}
