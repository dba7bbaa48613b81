//! Configuration for the OAuth 2.0 server.
//!
//! A `Config` is built once per server instance and shared read-only with every
//! grant processor and controller.

use std::str::FromStr;

use anyhow::Context;

use crate::error::ConfigError;
use crate::models::Scope;

/// Default option values.
pub mod defaults {
    /// ID token lifetime (1 hour). Carried for compatibility only.
    pub const ID_LIFETIME: u64 = 3600;

    /// Access token lifetime (90 days).
    pub const ACCESS_LIFETIME: u64 = 7_776_000;

    /// Refresh token lifetime (180 days).
    pub const REFRESH_TOKEN_LIFETIME: u64 = 15_552_000;

    /// Authorization code lifetime (30 seconds).
    pub const AUTH_CODE_LIFETIME: u64 = 30;

    /// Upper bound accepted for any lifetime (100 years).
    pub const MAX_LIFETIME: u64 = 3_153_600_000;

    /// Realm named in `WWW-Authenticate` headers.
    pub const WWW_REALM: &str = "Service";

    /// Query/body parameter carrying an access token.
    pub const TOKEN_PARAM_NAME: &str = "access_token";

    /// Authorization header scheme carrying an access token.
    pub const TOKEN_BEARER_HEADER_NAME: &str = "Bearer";

    /// JWT issuer claim.
    pub const ISSUER: &str = "oauth2-server";

    /// Prefix for environment variables read by [`super::Config::from_env`].
    pub const ENV_PREFIX: &str = "OAUTH2_";
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Encode access tokens as signed JWTs instead of opaque storage keys.
    pub use_jwt_access_tokens: bool,

    /// Store tokens and codes encrypted at rest.
    pub store_encrypted_token_string: bool,

    /// OpenID Connect is not supported; enabling this fails validation.
    pub use_openid_connect: bool,

    /// ID token lifetime in seconds (unused without OpenID Connect).
    pub id_lifetime: u64,

    /// Access token lifetime in seconds.
    pub access_lifetime: u64,

    /// Realm for `WWW-Authenticate` challenges.
    pub www_realm: String,

    /// Parameter name for access tokens sent in the query or body.
    pub token_param_name: String,

    /// Authorization header scheme for access tokens.
    pub token_bearer_header_name: String,

    /// Require the `state` parameter on authorize requests.
    pub enforce_state: bool,

    /// Redirect URIs must match exactly (otherwise the registered URI is a prefix).
    pub require_exact_redirect_uri: bool,

    /// Allow the implicit flow (`response_type=token`).
    pub allow_implicit: bool,

    /// Accept `client_id`/`client_secret` in the token request body.
    pub allow_credentials_in_request_body: bool,

    /// Accept clients without a secret.
    pub allow_public_clients: bool,

    /// Rotate the refresh token on every refresh-token grant.
    pub always_issue_new_refresh_token: bool,

    /// Delete the presented refresh token after use.
    pub unset_refresh_token_after_use: bool,

    /// Refresh token lifetime in seconds.
    pub refresh_token_lifetime: u64,

    /// Authorization code lifetime in seconds.
    pub auth_code_lifetime: u64,

    /// Issue a refresh token alongside the access token for authorization codes.
    pub issue_refresh_token: bool,

    /// Scope applied when an authorize request names none.
    pub default_scope: Option<Scope>,

    /// JWT `iss` claim.
    pub issuer: String,

    /// Secret for at-rest token encryption. Ephemeral when unset.
    pub encryption_key: Option<String>,

    /// HS256 secret for JWT access tokens. Ephemeral when unset.
    pub jwt_secret: Option<String>,
}

impl Config {
    /// Create a test configuration with fixed keys.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            encryption_key: Some("test-encryption-key-0123456789abcdef".to_string()),
            jwt_secret: Some("test-jwt-secret-0123456789abcdef".to_string()),
            ..Self::default()
        }
    }

    /// Create configuration from `OAUTH2_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the result fails validation.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary `OAUTH2_*` key lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or the result fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let env = EnvReader { lookup };
        let base = Self::default();

        let config = Self {
            use_jwt_access_tokens: env.parse("USE_JWT_ACCESS_TOKENS", base.use_jwt_access_tokens)?,
            store_encrypted_token_string: env
                .parse("STORE_ENCRYPTED_TOKEN_STRING", base.store_encrypted_token_string)?,
            use_openid_connect: env.parse("USE_OPENID_CONNECT", base.use_openid_connect)?,
            id_lifetime: env.parse("ID_LIFETIME", base.id_lifetime)?,
            access_lifetime: env.parse("ACCESS_LIFETIME", base.access_lifetime)?,
            www_realm: env.string("WWW_REALM", base.www_realm),
            token_param_name: env.string("TOKEN_PARAM_NAME", base.token_param_name),
            token_bearer_header_name: env
                .string("TOKEN_BEARER_HEADER_NAME", base.token_bearer_header_name),
            enforce_state: env.parse("ENFORCE_STATE", base.enforce_state)?,
            require_exact_redirect_uri: env
                .parse("REQUIRE_EXACT_REDIRECT_URI", base.require_exact_redirect_uri)?,
            allow_implicit: env.parse("ALLOW_IMPLICIT", base.allow_implicit)?,
            allow_credentials_in_request_body: env.parse(
                "ALLOW_CREDENTIALS_IN_REQUEST_BODY",
                base.allow_credentials_in_request_body,
            )?,
            allow_public_clients: env.parse("ALLOW_PUBLIC_CLIENTS", base.allow_public_clients)?,
            always_issue_new_refresh_token: env
                .parse("ALWAYS_ISSUE_NEW_REFRESH_TOKEN", base.always_issue_new_refresh_token)?,
            unset_refresh_token_after_use: env
                .parse("UNSET_REFRESH_TOKEN_AFTER_USE", base.unset_refresh_token_after_use)?,
            refresh_token_lifetime: env
                .parse("REFRESH_TOKEN_LIFETIME", base.refresh_token_lifetime)?,
            auth_code_lifetime: env.parse("AUTH_CODE_LIFETIME", base.auth_code_lifetime)?,
            issue_refresh_token: env.parse("ISSUE_REFRESH_TOKEN", base.issue_refresh_token)?,
            default_scope: env.get("DEFAULT_SCOPE").map(|s| Scope::parse(&s)),
            issuer: env.string("ISSUER", base.issuer),
            encryption_key: env.get("ENCRYPTION_KEY"),
            jwt_secret: env.get("JWT_SECRET"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject option combinations the server cannot honour.
    ///
    /// # Errors
    ///
    /// Returns the first invalid option found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_openid_connect {
            return Err(ConfigError::Unsupported("use_openid_connect"));
        }
        for (key, value) in [
            ("access_lifetime", self.access_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
            ("auth_code_lifetime", self.auth_code_lifetime),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, "lifetime must be greater than zero"));
            }
            if value > defaults::MAX_LIFETIME {
                return Err(ConfigError::invalid(key, "lifetime is out of range"));
            }
        }
        for (key, value) in [
            ("www_realm", &self.www_realm),
            ("token_param_name", &self.token_param_name),
            ("token_bearer_header_name", &self.token_bearer_header_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(key, "must not be empty"));
            }
        }
        if self.www_realm.contains('"') {
            return Err(ConfigError::invalid("www_realm", "must not contain quotes"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_jwt_access_tokens: false,
            store_encrypted_token_string: true,
            use_openid_connect: false,
            id_lifetime: defaults::ID_LIFETIME,
            access_lifetime: defaults::ACCESS_LIFETIME,
            www_realm: defaults::WWW_REALM.to_string(),
            token_param_name: defaults::TOKEN_PARAM_NAME.to_string(),
            token_bearer_header_name: defaults::TOKEN_BEARER_HEADER_NAME.to_string(),
            enforce_state: false,
            require_exact_redirect_uri: true,
            allow_implicit: false,
            allow_credentials_in_request_body: true,
            allow_public_clients: true,
            always_issue_new_refresh_token: true,
            unset_refresh_token_after_use: false,
            refresh_token_lifetime: defaults::REFRESH_TOKEN_LIFETIME,
            auth_code_lifetime: defaults::AUTH_CODE_LIFETIME,
            issue_refresh_token: true,
            default_scope: None,
            issuer: defaults::ISSUER.to_string(),
            encryption_key: None,
            jwt_secret: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("use_jwt_access_tokens", &self.use_jwt_access_tokens)
            .field("store_encrypted_token_string", &self.store_encrypted_token_string)
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("auth_code_lifetime", &self.auth_code_lifetime)
            .field("www_realm", &self.www_realm)
            .field("enforce_state", &self.enforce_state)
            .field("require_exact_redirect_uri", &self.require_exact_redirect_uri)
            .field("allow_implicit", &self.allow_implicit)
            .field("allow_credentials_in_request_body", &self.allow_credentials_in_request_body)
            .field("allow_public_clients", &self.allow_public_clients)
            .field("always_issue_new_refresh_token", &self.always_issue_new_refresh_token)
            .field("unset_refresh_token_after_use", &self.unset_refresh_token_after_use)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Reads prefixed keys through a lookup function.
struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{}{key}", defaults::ENV_PREFIX)).filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.get(key).unwrap_or(default)
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .to_ascii_lowercase()
                .parse()
                .with_context(|| format!("invalid value for {}{key}: {raw:?}", defaults::ENV_PREFIX)),
            None => Ok(default),
        }
    }
}
