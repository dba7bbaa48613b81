//! Client authentication for the token endpoint (RFC 6749 §2.3.1).

use crate::config::Config;
use crate::error::{GrantResult, OAuthError};
use crate::http::Request;
use crate::models::Client;
use crate::storage::Storage;

const INVALID_CREDENTIALS: &str = "The client credentials are invalid";

/// Credentials presented by the client, from the `Authorization` header or the body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Presented<'a> {
    client_id: &'a str,
    client_secret: Option<&'a str>,
    from_header: bool,
}

/// Authenticate the client of a token request.
///
/// The `Authorization: Basic` header wins over body parameters. Body credentials
/// are only accepted when `allow_credentials_in_request_body` is set, except that
/// a public client may always identify itself with `client_id` alone.
pub(crate) async fn authenticate_client(
    storage: &dyn Storage,
    config: &Config,
    request: &Request,
) -> GrantResult<Client> {
    let basic = request.basic_credentials();
    let presented = match &basic {
        Some(credentials) => Presented {
            client_id: &credentials.client_id,
            client_secret: Some(credentials.client_secret.as_str()).filter(|s| !s.is_empty()),
            from_header: true,
        },
        None => presented_in_body(request)?,
    };

    if !presented.from_header
        && presented.client_secret.is_some()
        && !config.allow_credentials_in_request_body
    {
        return Err(OAuthError::invalid_request(
            "Client credentials are not allowed in the request body",
        )
        .into());
    }

    let client = storage
        .get_client(presented.client_id)
        .await?
        .ok_or_else(|| OAuthError::invalid_client(INVALID_CREDENTIALS))?;

    if client.is_public() && !config.allow_public_clients {
        return Err(OAuthError::invalid_client("Public clients are not allowed").into());
    }

    if !storage.check_client_credentials(presented.client_id, presented.client_secret).await? {
        tracing::debug!(client_id = %presented.client_id, "Client authentication failed");
        return Err(OAuthError::invalid_client(INVALID_CREDENTIALS).into());
    }

    Ok(client)
}

fn presented_in_body(request: &Request) -> Result<Presented<'_>, OAuthError> {
    let client_id = request.body("client_id").ok_or_else(|| {
        OAuthError::invalid_client("Client credentials were not found in the headers or body")
    })?;
    Ok(Presented { client_id, client_secret: request.body("client_secret"), from_header: false })
}
