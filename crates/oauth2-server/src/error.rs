//! Error types for the OAuth 2.0 server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Protocol errors (`OAuthError`) are surfaced verbatim to the caller; storage and codec
//! failures are reported as an opaque `server_error`.

use std::fmt;

/// OAuth 2.0 error code vocabulary (RFC 6749 §4.1.2.1, §5.2 and RFC 6750 §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    InvalidClient,
    UnauthorizedClient,
    InvalidGrant,
    UnsupportedGrantType,
    InvalidScope,
    RedirectUriMismatch,
    UnsupportedResponseType,
    AccessDenied,
    InvalidUri,
    InvalidToken,
    InsufficientScope,
    ServerError,
}

impl ErrorCode {
    /// Wire name of the error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::RedirectUriMismatch => "redirect_uri_mismatch",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::AccessDenied => "access_denied",
            Self::InvalidUri => "invalid_uri",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
            Self::ServerError => "server_error",
        }
    }

    /// HTTP status used when this error is returned directly (not redirected).
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::InvalidClient | Self::InvalidToken => 401,
            Self::InsufficientScope => 403,
            Self::ServerError => 500,
            _ => 400,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol-level OAuth error: an error code plus a human readable description.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {description}")]
pub struct OAuthError {
    pub code: ErrorCode,
    pub description: String,
}

impl OAuthError {
    #[must_use]
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self { code, description: description.into() }
    }

    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, description)
    }

    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidClient, description)
    }

    #[must_use]
    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnauthorizedClient, description)
    }

    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant, description)
    }

    #[must_use]
    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidScope, description)
    }

    /// Missing required request parameter.
    #[must_use]
    pub fn missing_parameter(name: &str) -> Self {
        Self::invalid_request(format!("Missing parameter: \"{name}\" is required"))
    }

    /// The generic error that replaces any internal failure on the wire.
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(ErrorCode::ServerError, "The server encountered an unexpected error")
    }
}

/// Errors from a storage backend.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// A record with the same key already exists.
    #[error("{kind} already exists")]
    Conflict {
        /// Which table the collision happened in
        kind: &'static str,
    },

    /// Backend failure (connectivity, constraint violation, ...)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    #[must_use]
    pub const fn conflict(kind: &'static str) -> Self {
        Self::Conflict { kind }
    }

    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors from token generation, encryption or JWT encoding.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The system random source or a cipher operation failed.
    #[error("cryptographic operation failed")]
    Crypto,

    /// A stored token value is not in the expected format.
    #[error("malformed token value")]
    Malformed,

    /// JWT encoding or validation error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl From<ring::error::Unspecified> for CodecError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::Crypto
    }
}

/// Errors from a grant processor or controller.
#[derive(thiserror::Error, Debug)]
pub enum GrantError {
    /// Validation failure reported to the client as-is
    #[error(transparent)]
    Protocol(#[from] OAuthError),

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Token codec failure
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl GrantError {
    /// The error as it is shown to the client. Internal failures collapse into
    /// `server_error` without detail.
    #[must_use]
    pub fn to_oauth_error(&self) -> OAuthError {
        match self {
            Self::Protocol(err) => err.clone(),
            Self::Storage(_) | Self::Codec(_) => OAuthError::server_error(),
        }
    }

    /// Returns true if this error is a validation failure rather than a fault.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Invalid server configuration.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// Option name
        key: &'static str,
        /// What is wrong with it
        message: String,
    },

    #[error("{0} is not supported by this server")]
    Unsupported(&'static str),
}

impl ConfigError {
    #[must_use]
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { key, message: message.into() }
    }
}

/// Failure constructing a server.
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for grant processing.
pub type GrantResult<T> = Result<T, GrantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::InvalidClient.status(), 401);
        assert_eq!(ErrorCode::InvalidToken.status(), 401);
        assert_eq!(ErrorCode::InsufficientScope.status(), 403);
        assert_eq!(ErrorCode::InvalidGrant.status(), 400);
        assert_eq!(ErrorCode::ServerError.status(), 500);
    }

    #[test]
    fn test_storage_error_hides_detail() {
        let err = GrantError::from(StorageError::backend("connection refused to 10.0.0.3:5432"));
        let shown = err.to_oauth_error();
        assert_eq!(shown.code, ErrorCode::ServerError);
        assert!(!shown.description.contains("10.0.0.3"));
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_protocol_error_passes_through() {
        let err = GrantError::from(OAuthError::invalid_scope("too broad"));
        assert!(err.is_protocol());
        assert_eq!(err.to_oauth_error().code, ErrorCode::InvalidScope);
        assert_eq!(err.to_string(), "invalid_scope: too broad");
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = OAuthError::missing_parameter("code");
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert_eq!(err.description, "Missing parameter: \"code\" is required");
    }
}
