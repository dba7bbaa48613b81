//! Registered OAuth clients and the grant types they may use.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Scope;

/// A grant type a client can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
    Implicit,
}

impl GrantType {
    /// The `grant_type` parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::Implicit => "implicit",
        }
    }

    /// Parse a `grant_type` value. Unknown names yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            "implicit" => Some(Self::Implicit),
            _ => None,
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered OAuth client.
///
/// A client without a secret is public and authenticates by identifier alone
/// (only accepted when `allow_public_clients` is enabled).
#[derive(Clone, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Allowed grant types. Empty means unrestricted.
    #[serde(default)]
    pub grant_types: Vec<GrantType>,
    /// Allowed scope. `None` means unrestricted.
    #[serde(default)]
    pub scope: Option<Scope>,
    /// Owner of the client, if any.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Client {
    /// A confidential client with a secret and a single redirect URI.
    #[must_use]
    pub fn confidential(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            redirect_uris: vec![redirect_uri.into()],
            grant_types: Vec::new(),
            scope: None,
            user_id: None,
        }
    }

    /// A public client (no secret) with a single redirect URI.
    #[must_use]
    pub fn public(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uris: vec![redirect_uri.into()],
            grant_types: Vec::new(),
            scope: None,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_grant_types(mut self, grant_types: impl IntoIterator<Item = GrantType>) -> Self {
        self.grant_types = grant_types.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.client_secret.as_deref().is_none_or(str::is_empty)
    }

    #[must_use]
    pub fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.is_empty() || self.grant_types.contains(&grant_type)
    }

    #[must_use]
    pub fn allows_scope(&self, requested: &Scope) -> bool {
        self.scope.as_ref().is_none_or(|allowed| requested.is_subset_of(allowed))
    }

    /// Whether `supplied` matches one of the registered redirect URIs.
    #[must_use]
    pub fn accepts_redirect_uri(&self, supplied: &str, require_exact: bool) -> bool {
        self.redirect_uris.iter().any(|registered| redirect_uri_matches(registered, supplied, require_exact))
    }
}

/// Compare a redirect URI against the expected one. In non-exact mode the
/// expected URI only has to be a prefix of the supplied one.
#[must_use]
pub fn redirect_uri_matches(expected: &str, supplied: &str, require_exact: bool) -> bool {
    if require_exact { supplied == expected } else { supplied.starts_with(expected) }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("public", &self.is_public())
            .field("redirect_uris", &self.redirect_uris)
            .field("grant_types", &self.grant_types)
            .field("scope", &self.scope)
            .finish()
    }
}
