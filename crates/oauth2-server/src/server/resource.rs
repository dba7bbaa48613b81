//! Protected resource verification (RFC 6750).

use crate::error::{ErrorCode, GrantError, OAuthError};
use crate::http::{Request, Response};
use crate::models::{AccessToken, Scope, unix_now};

use super::Server;

const INVALID_TOKEN: &str = "The access token provided is invalid";

impl Server {
    /// Verify the bearer token of a resource request, optionally requiring `scope`.
    ///
    /// The token may arrive in the `Authorization` header, or as the configured
    /// parameter in the query or body, but through only one of them.
    ///
    /// # Errors
    ///
    /// Returns the challenge response to send when the token is missing, invalid,
    /// expired, or lacks the required scope.
    pub async fn verify_resource_request(
        &self,
        request: &Request,
        scope: Option<&Scope>,
    ) -> Result<AccessToken, Response> {
        let token = self.bearer_token(request)?;

        let record = match self.load_access_token(token).await {
            Ok(Some(record)) if !record.is_expired(unix_now()) => record,
            Ok(_) => return Err(self.challenge(&OAuthError::new(ErrorCode::InvalidToken, INVALID_TOKEN))),
            Err(err) => {
                tracing::error!(error = %err, "Access token lookup failed");
                return Err(Response::error(&err.to_oauth_error()));
            }
        };

        if let Some(required) = scope {
            if !record.scope.contains_all(required) {
                tracing::debug!(client_id = %record.client_id, required = %required, "Insufficient scope");
                return Err(self.challenge(&OAuthError::new(
                    ErrorCode::InsufficientScope,
                    "The request requires higher privileges than provided by the access token",
                )));
            }
        }

        Ok(record)
    }

    fn bearer_token<'r>(&self, request: &'r Request) -> Result<&'r str, Response> {
        let config = self.config();
        let header = request.authorization(&config.token_bearer_header_name);
        let query = request.query(&config.token_param_name);
        let body = request.body(&config.token_param_name);

        match (header, query, body) {
            (Some(token), None, None) | (None, Some(token), None) | (None, None, Some(token)) => Ok(token),
            (None, None, None) => Err(Response::new(401).with_challenge(
                &config.token_bearer_header_name,
                &config.www_realm,
                None,
            )),
            _ => Err(self.challenge(&OAuthError::invalid_request(
                "Only one method may be used to authenticate at a time (Auth header, GET or POST)",
            ))),
        }
    }

    async fn load_access_token(&self, token: &str) -> Result<Option<AccessToken>, GrantError> {
        if let Some(decoded) = self.codec().decode_jwt_access_token(token) {
            // A token that fails signature or issuer checks is simply not ours.
            return Ok(decoded.ok());
        }
        let stored = self.codec().to_stored(token)?;
        Ok(self
            .storage()
            .get_access_token(&stored)
            .await?
            .filter(|record| self.codec().matches_stored(&record.access_token, token)))
    }

    fn challenge(&self, err: &OAuthError) -> Response {
        let config = self.config();
        Response::error(err).with_challenge(&config.token_bearer_header_name, &config.www_realm, Some(err))
    }
}
