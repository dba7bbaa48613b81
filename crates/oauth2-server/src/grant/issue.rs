use crate::error::GrantResult;
use crate::http::TokenPayload;
use crate::models::{AccessToken, RefreshToken, Scope, unix_now};

use super::GrantContext;

/// Mint and persist an access token, plus a refresh token when `refresh_scope`
/// is given.
///
/// If the refresh token cannot be persisted the access token stored a moment
/// earlier is removed again, so the caller never observes half a token set.
pub async fn issue_tokens(
    ctx: &GrantContext<'_>,
    client_id: &str,
    user_id: Option<&str>,
    scope: &Scope,
    refresh_scope: Option<&Scope>,
) -> GrantResult<TokenPayload> {
    let now = unix_now();
    let expires = now.saturating_add(ctx.config.access_lifetime as i64);
    let access_token = ctx.codec.mint_access_token(client_id, user_id, scope, now, expires)?;

    let stored_access = if ctx.codec.uses_jwt_access_tokens() {
        None
    } else {
        let stored = ctx.codec.to_stored(&access_token)?;
        ctx.storage
            .set_access_token(AccessToken {
                access_token: stored.clone(),
                client_id: client_id.to_owned(),
                user_id: user_id.map(str::to_owned),
                expires,
                scope: scope.clone(),
            })
            .await?;
        Some(stored)
    };

    let refresh_token = match refresh_scope {
        Some(refresh_scope) => {
            match persist_refresh_token(ctx, client_id, user_id, refresh_scope, now).await {
                Ok(token) => Some(token),
                Err(err) => {
                    if let Some(stored) = stored_access {
                        rollback_access_token(ctx, &stored).await;
                    }
                    return Err(err);
                }
            }
        }
        None => None,
    };

    Ok(TokenPayload {
        access_token,
        token_type: TokenPayload::TOKEN_TYPE,
        expires_in: ctx.config.access_lifetime,
        refresh_token,
        scope: scope.to_option_string(),
    })
}

async fn persist_refresh_token(
    ctx: &GrantContext<'_>,
    client_id: &str,
    user_id: Option<&str>,
    scope: &Scope,
    now: i64,
) -> GrantResult<String> {
    let token = ctx.codec.generate_token()?;
    ctx.storage
        .set_refresh_token(RefreshToken {
            refresh_token: ctx.codec.to_stored(&token)?,
            client_id: client_id.to_owned(),
            user_id: user_id.map(str::to_owned),
            expires: now.saturating_add(ctx.config.refresh_token_lifetime as i64),
            scope: scope.clone(),
        })
        .await?;
    Ok(token)
}

async fn rollback_access_token(ctx: &GrantContext<'_>, stored: &str) {
    match ctx.storage.unset_access_token(stored).await {
        Ok(_) => tracing::debug!("Rolled back access token after refresh token failure"),
        Err(err) => tracing::error!(error = %err, "Failed to roll back access token"),
    }
}
