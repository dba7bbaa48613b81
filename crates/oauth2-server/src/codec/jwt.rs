//! JWT-encoded access tokens (HS256).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::models::{AccessToken, Scope};

/// Claims carried by a JWT access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub jti: String,
    pub iss: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub token_type: String,
}

/// Signs and verifies JWT access tokens with a shared secret.
pub struct JwtAccessTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtAccessTokens {
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    /// Encode an access token for `client_id` that expires at `expires`.
    pub fn encode(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: &Scope,
        issued_at: i64,
        expires: i64,
    ) -> Result<String, CodecError> {
        let claims = AccessTokenClaims {
            jti: uuid::Uuid::new_v4().simple().to_string(),
            iss: self.issuer.clone(),
            client_id: client_id.to_owned(),
            sub: user_id.map(str::to_owned),
            scope: scope.to_option_string(),
            iat: issued_at,
            exp: expires,
            token_type: "bearer".to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Verify signature and issuer and return the token as a record.
    ///
    /// Expiry is left to the caller so that it follows the same `now >= expires`
    /// rule as stored tokens.
    pub fn decode(&self, token: &str) -> Result<AccessToken, CodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?.claims;
        Ok(AccessToken {
            access_token: token.to_owned(),
            client_id: claims.client_id,
            user_id: claims.sub,
            expires: claims.exp,
            scope: claims.scope.as_deref().map(Scope::parse).unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for JwtAccessTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAccessTokens").field("issuer", &self.issuer).finish_non_exhaustive()
    }
}
