//! Outbound protocol results: status, headers and a JSON body.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::OAuthError;

/// Successful token endpoint payload (RFC 6749 §5.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPayload {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenPayload {
    pub const TOKEN_TYPE: &'static str = "bearer";
}

/// A transport-neutral response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Option<serde_json::Value>,
}

impl Response {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self { status, headers: BTreeMap::new(), body: None }
    }

    #[must_use]
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::new(status).with_header("Content-Type", "application/json").with_body(body)
    }

    /// `200` with the token payload and the RFC 6749 §5.1 cache headers.
    #[must_use]
    pub fn token(payload: &TokenPayload) -> Self {
        let body = serde_json::to_value(payload).unwrap_or_default();
        Self::json(200, body).no_store()
    }

    /// An error response with the status its code implies.
    #[must_use]
    pub fn error(err: &OAuthError) -> Self {
        Self::error_with_status(err.code.status(), err)
    }

    #[must_use]
    pub fn error_with_status(status: u16, err: &OAuthError) -> Self {
        Self::json(
            status,
            serde_json::json!({
                "error": err.code.as_str(),
                "error_description": err.description,
            }),
        )
        .no_store()
    }

    /// `302 Found` to `location`.
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        Self::new(302).with_header("Location", location)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add `Cache-Control: no-store` and `Pragma: no-cache`.
    #[must_use]
    pub fn no_store(self) -> Self {
        self.with_header("Cache-Control", "no-store").with_header("Pragma", "no-cache")
    }

    /// Add a `WWW-Authenticate` challenge naming `realm`, plus the error when there is one.
    #[must_use]
    pub fn with_challenge(self, scheme: &str, realm: &str, err: Option<&OAuthError>) -> Self {
        let mut challenge = format!("{scheme} realm=\"{realm}\"");
        if let Some(err) = err {
            challenge.push_str(&format!(
                ", error=\"{}\", error_description=\"{}\"",
                err.code,
                err.description.replace('"', "'")
            ));
        }
        self.with_header("WWW-Authenticate", &challenge)
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        self.status == 302
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// A top-level string field of the body.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.body.as_ref()?.get(name)?.as_str()
    }
}
