//! Data model for clients, authorization codes, tokens and scopes.
//!
//! Timestamps are unix seconds. A record is expired once `now >= expires`.

mod client;
mod scope;
mod token;

pub use client::{Client, GrantType, redirect_uri_matches};
pub use scope::Scope;
pub use token::{AccessToken, AuthorizationCode, CodeChallengeMethod, RefreshToken};

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
