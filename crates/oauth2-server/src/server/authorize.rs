//! Authorization endpoint (RFC 6749 §4.1.1, §4.2.1).
//!
//! Errors about the client or its redirect URI are answered directly, since the
//! redirect target cannot be trusted yet. Every later error is redirected back to
//! the client with `error`, `error_description` and `state`.

use serde::Serialize;
use url::Url;

use crate::error::{ErrorCode, GrantError, OAuthError};
use crate::grant::{issue_tokens, pkce};
use crate::http::{Request, Response, TokenPayload};
use crate::models::{AuthorizationCode, CodeChallengeMethod, GrantType, Scope, unix_now};

use super::Server;

/// Requested `response_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Authorization code, returned in the redirect query.
    Code,
    /// Implicit access token, returned in the redirect fragment.
    Token,
}

impl ResponseType {
    const fn grant_type(self) -> GrantType {
        match self {
            Self::Code => GrantType::AuthorizationCode,
            Self::Token => GrantType::Implicit,
        }
    }
}

/// A validated authorization request, ready to be shown to the resource owner.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub response_type: ResponseType,
    /// Where the result is sent.
    pub redirect_uri: String,
    /// The `redirect_uri` parameter as sent, recorded with the code.
    #[serde(skip)]
    pub supplied_redirect_uri: Option<String>,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,
}

/// Target of an error redirect, known once the redirect URI has been validated.
struct RedirectTarget<'a> {
    redirect_uri: &'a str,
    state: Option<&'a str>,
    in_fragment: bool,
}

impl RedirectTarget<'_> {
    fn error(&self, err: &OAuthError) -> Response {
        let mut params = vec![("error", err.code.as_str()), ("error_description", err.description.as_str())];
        if let Some(state) = self.state {
            params.push(("state", state));
        }
        redirect_with(self.redirect_uri, &params, self.in_fragment)
    }
}

impl Server {
    /// Validate an authorization request without issuing anything.
    ///
    /// # Errors
    ///
    /// Returns the response to send instead: a direct error for a bad client or
    /// redirect URI, an error redirect otherwise.
    pub async fn validate_authorize_request(&self, request: &Request) -> Result<AuthorizeRequest, Response> {
        let config = self.config();

        let client_id = request
            .param("client_id")
            .ok_or_else(|| direct_error(OAuthError::invalid_client("No client id supplied")))?;
        let client = match self.storage().get_client(client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => return Err(direct_error(OAuthError::invalid_client("The client id supplied is invalid"))),
            Err(err) => return Err(fault(&GrantError::from(err))),
        };

        let supplied_redirect_uri = request.param("redirect_uri");
        let redirect_uri = match supplied_redirect_uri {
            Some(supplied) => {
                let parsed = Url::parse(supplied).map_err(|_| {
                    direct_error(invalid_uri("The redirect URI provided is malformed"))
                })?;
                if parsed.fragment().is_some() {
                    return Err(direct_error(invalid_uri("The redirect URI must not contain a fragment")));
                }
                if !client.accepts_redirect_uri(supplied, config.require_exact_redirect_uri) {
                    return Err(direct_error(OAuthError::new(
                        ErrorCode::RedirectUriMismatch,
                        "The redirect URI provided is missing or does not match",
                    )));
                }
                supplied.to_owned()
            }
            None => match client.redirect_uris.as_slice() {
                [only] => only.clone(),
                [] => return Err(direct_error(invalid_uri("No redirect URI was supplied or stored"))),
                _ => {
                    return Err(direct_error(invalid_uri(
                        "A redirect URI must be supplied when multiple redirect URIs are registered",
                    )));
                }
            },
        };

        let state = request.param("state");
        let raw_response_type = request.param("response_type");
        let target = RedirectTarget {
            redirect_uri: &redirect_uri,
            state,
            in_fragment: raw_response_type == Some("token"),
        };

        let response_type = match raw_response_type {
            Some("code") => ResponseType::Code,
            Some("token") if config.allow_implicit => ResponseType::Token,
            Some("token") => {
                return Err(target.error(&OAuthError::unauthorized_client(
                    "The implicit grant type is not allowed",
                )));
            }
            Some(_) => {
                return Err(target.error(&OAuthError::new(
                    ErrorCode::UnsupportedResponseType,
                    "The response type is not supported by the authorization server",
                )));
            }
            None => return Err(target.error(&OAuthError::invalid_request("Invalid or missing response type"))),
        };

        match self.storage().check_restricted_grant_type(&client.client_id, response_type.grant_type()).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(target.error(&OAuthError::unauthorized_client(
                    "The grant type is unauthorized for this client_id",
                )));
            }
            Err(err) => return Err(fault(&GrantError::from(err))),
        }

        let scope = match request.param("scope").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Scope::parse_strict(raw)
                .ok_or_else(|| target.error(&OAuthError::invalid_scope("An unsupported scope was requested")))?,
            None => config.default_scope.clone().unwrap_or_default(),
        };
        if !client.allows_scope(&scope) {
            return Err(target.error(&OAuthError::invalid_scope("The scope requested is invalid for this client")));
        }

        if config.enforce_state && state.is_none() {
            return Err(target.error(&OAuthError::invalid_request("The state parameter is required")));
        }

        let (code_challenge, code_challenge_method) = match request.param("code_challenge") {
            Some(challenge) if response_type == ResponseType::Code => {
                let method = match request.param("code_challenge_method") {
                    None => CodeChallengeMethod::S256,
                    Some(raw) => CodeChallengeMethod::parse(raw).ok_or_else(|| {
                        target.error(&OAuthError::invalid_request(
                            "The code_challenge_method must be \"S256\" or \"plain\"",
                        ))
                    })?,
                };
                if !pkce::is_well_formed(challenge) {
                    return Err(target.error(&OAuthError::invalid_request(
                        "The PKCE code challenge supplied is invalid",
                    )));
                }
                (Some(challenge.to_owned()), Some(method))
            }
            _ => (None, None),
        };

        Ok(AuthorizeRequest {
            client_id: client.client_id,
            response_type,
            redirect_uri,
            supplied_redirect_uri: supplied_redirect_uri.map(str::to_owned),
            scope,
            state: state.map(str::to_owned),
            code_challenge,
            code_challenge_method,
        })
    }

    /// Complete an authorization request once the resource owner has decided.
    ///
    /// Approval redirects with a code (or, for the implicit flow, an access
    /// token in the fragment); denial redirects with `access_denied`.
    pub async fn handle_authorize_request(
        &self,
        request: &Request,
        is_authorized: bool,
        user_id: Option<&str>,
    ) -> Response {
        let authorize = match self.validate_authorize_request(request).await {
            Ok(authorize) => authorize,
            Err(response) => return response,
        };
        let target = RedirectTarget {
            redirect_uri: &authorize.redirect_uri,
            state: authorize.state.as_deref(),
            in_fragment: authorize.response_type == ResponseType::Token,
        };

        if !is_authorized {
            tracing::debug!(client_id = %authorize.client_id, "Authorization denied");
            return target.error(&OAuthError::new(
                ErrorCode::AccessDenied,
                "The user denied access to your application",
            ));
        }

        match authorize.response_type {
            ResponseType::Code => match self.issue_authorization_code(&authorize, user_id).await {
                Ok(code) => {
                    tracing::info!(client_id = %authorize.client_id, scope = %authorize.scope, "Authorization code issued");
                    let mut params = vec![("code", code.as_str())];
                    if let Some(state) = target.state {
                        params.push(("state", state));
                    }
                    redirect_with(target.redirect_uri, &params, false)
                }
                Err(err) => self.authorize_fault(&target, &err),
            },
            ResponseType::Token => {
                match issue_tokens(&self.context(), &authorize.client_id, user_id, &authorize.scope, None).await {
                    Ok(payload) => {
                        tracing::info!(client_id = %authorize.client_id, scope = %authorize.scope, "Implicit access token issued");
                        implicit_redirect(&target, &payload)
                    }
                    Err(err) => self.authorize_fault(&target, &err),
                }
            }
        }
    }

    async fn issue_authorization_code(
        &self,
        authorize: &AuthorizeRequest,
        user_id: Option<&str>,
    ) -> Result<String, GrantError> {
        let code = self.codec().generate_token()?;
        let record = AuthorizationCode {
            code: self.codec().to_stored(&code)?,
            client_id: authorize.client_id.clone(),
            user_id: user_id.map(str::to_owned),
            redirect_uri: authorize.supplied_redirect_uri.clone(),
            expires: unix_now().saturating_add(self.config().auth_code_lifetime as i64),
            scope: authorize.scope.clone(),
            code_challenge: authorize.code_challenge.clone(),
            code_challenge_method: authorize.code_challenge_method,
            used: false,
        };
        self.storage().set_authorization_code(record).await?;
        Ok(code)
    }

    fn authorize_fault(&self, target: &RedirectTarget<'_>, err: &GrantError) -> Response {
        tracing::error!(error = %err, "Authorization request failed");
        target.error(&err.to_oauth_error())
    }
}

fn implicit_redirect(target: &RedirectTarget<'_>, payload: &TokenPayload) -> Response {
    let expires_in = payload.expires_in.to_string();
    let mut params = vec![
        ("access_token", payload.access_token.as_str()),
        ("token_type", payload.token_type),
        ("expires_in", expires_in.as_str()),
    ];
    if let Some(scope) = payload.scope.as_deref() {
        params.push(("scope", scope));
    }
    if let Some(state) = target.state {
        params.push(("state", state));
    }
    redirect_with(target.redirect_uri, &params, true).no_store()
}

/// Redirect to `redirect_uri` with `params` appended to the query, or placed in
/// the fragment.
fn redirect_with(redirect_uri: &str, params: &[(&str, &str)], in_fragment: bool) -> Response {
    let Ok(mut url) = Url::parse(redirect_uri) else {
        return direct_error(invalid_uri("The redirect URI provided is malformed"));
    };
    if in_fragment {
        let fragment = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();
        url.set_fragment(Some(&fragment));
    } else {
        url.query_pairs_mut().extend_pairs(params);
    }
    Response::redirect(url.as_str())
}

fn invalid_uri(description: &str) -> OAuthError {
    OAuthError::new(ErrorCode::InvalidUri, description)
}

/// Errors answered to the user agent directly. Always `400`, even for
/// `invalid_client`, since no client authentication was attempted.
fn direct_error(err: OAuthError) -> Response {
    Response::error_with_status(400, &err)
}

fn fault(err: &GrantError) -> Response {
    tracing::error!(error = %err, "Authorization request failed");
    Response::error(&err.to_oauth_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_with_query() {
        let response = redirect_with("https://app/cb?x=1", &[("code", "abc"), ("state", "s p")], false);
        assert_eq!(response.status(), 302);
        assert_eq!(response.header("Location"), Some("https://app/cb?x=1&code=abc&state=s+p"));
    }

    #[test]
    fn test_redirect_with_fragment() {
        let response = redirect_with("https://app/cb", &[("access_token", "t1"), ("state", "xyz")], true);
        assert_eq!(response.header("Location"), Some("https://app/cb#access_token=t1&state=xyz"));
    }

    #[test]
    fn test_direct_error_is_bad_request() {
        let response = direct_error(OAuthError::invalid_client("No client id supplied"));
        assert_eq!(response.status(), 400);
        assert_eq!(response.parameter("error"), Some("invalid_client"));
    }
}
