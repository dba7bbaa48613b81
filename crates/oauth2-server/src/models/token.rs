//! Authorization code and token records as persisted by a storage backend.
//!
//! The `code` / `access_token` / `refresh_token` fields hold the stored form of
//! the token produced by the token codec, which is also the lookup key.

use serde::{Deserialize, Serialize};

use super::Scope;

/// PKCE code challenge method (RFC 7636 §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[serde(rename = "plain")]
    Plain,
    S256,
}

impl CodeChallengeMethod {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(Self::Plain),
            "S256" => Some(Self::S256),
            _ => None,
        }
    }
}

/// An authorization code issued after user approval. Single use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: Option<String>,
    /// The `redirect_uri` supplied on the authorize request, if any.
    pub redirect_uri: Option<String>,
    pub expires: i64,
    pub scope: Scope,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<CodeChallengeMethod>,
    #[serde(default)]
    pub used: bool,
}

impl AuthorizationCode {
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now >= self.expires
    }

    /// Neither expired nor already redeemed.
    #[must_use]
    pub const fn is_redeemable(&self, now: i64) -> bool {
        !self.used && !self.is_expired(now)
    }
}

/// An access token for protected resource requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub client_id: String,
    pub user_id: Option<String>,
    pub expires: i64,
    pub scope: Scope,
}

impl AccessToken {
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now >= self.expires
    }
}

/// A refresh token for obtaining new access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub refresh_token: String,
    pub client_id: String,
    pub user_id: Option<String>,
    pub expires: i64,
    pub scope: Scope,
}

impl RefreshToken {
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now >= self.expires
    }
}
