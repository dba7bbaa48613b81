//! Token codec: random token generation, at-rest encryption and JWT access tokens.

mod cipher;
mod jwt;

pub use cipher::TokenCipher;
pub use jwt::{AccessTokenClaims, JwtAccessTokens};

use ring::rand::{SecureRandom, SystemRandom};

use crate::config::Config;
use crate::error::CodecError;
use crate::models::{AccessToken, Scope};

/// Random bytes per opaque token (160 bits, 40 hex characters).
pub const TOKEN_BYTES: usize = 20;

/// Width of a generated token once sealed at rest: base64url of a 12-byte
/// nonce, the 40-byte ciphertext and a 16-byte tag. Storage columns keyed by
/// stored tokens must hold at least this many characters.
pub const STORED_TOKEN_LEN: usize = 91;

/// Bytes of an ephemeral server secret generated when none is configured.
const EPHEMERAL_SECRET_BYTES: usize = 32;

/// Mints token strings and maps them to and from their stored form.
pub struct TokenCodec {
    rng: SystemRandom,
    cipher: Option<TokenCipher>,
    jwt: Option<JwtAccessTokens>,
}

impl TokenCodec {
    /// Build the codec described by `config`.
    ///
    /// Missing secrets are replaced with ephemeral random ones, which means tokens
    /// do not survive a restart.
    pub fn new(config: &Config) -> Result<Self, CodecError> {
        let rng = SystemRandom::new();

        let cipher = if config.store_encrypted_token_string {
            let secret = match &config.encryption_key {
                Some(key) => key.as_bytes().to_vec(),
                None => {
                    tracing::warn!("No encryption key configured, using an ephemeral key");
                    random_bytes(&rng, EPHEMERAL_SECRET_BYTES)?
                }
            };
            Some(TokenCipher::new(&secret)?)
        } else {
            None
        };

        let jwt = if config.use_jwt_access_tokens {
            let secret = match &config.jwt_secret {
                Some(secret) => secret.as_bytes().to_vec(),
                None => {
                    tracing::warn!("No JWT secret configured, using an ephemeral secret");
                    random_bytes(&rng, EPHEMERAL_SECRET_BYTES)?
                }
            };
            Some(JwtAccessTokens::new(&secret, config.issuer.clone()))
        } else {
            None
        };

        Ok(Self { rng, cipher, jwt })
    }

    /// Generate an opaque token: 160 random bits, hex encoded.
    pub fn generate_token(&self) -> Result<String, CodecError> {
        Ok(hex::encode(random_bytes(&self.rng, TOKEN_BYTES)?))
    }

    /// The form a token takes in storage (and the key it is looked up by).
    ///
    /// With encryption at rest a generated token becomes [`STORED_TOKEN_LEN`]
    /// characters; otherwise it is stored as is.
    pub fn to_stored(&self, token: &str) -> Result<String, CodecError> {
        match &self.cipher {
            Some(cipher) => cipher.seal(token),
            None => Ok(token.to_owned()),
        }
    }

    /// Whether the stored value loaded for `presented` really belongs to it.
    #[must_use]
    pub fn matches_stored(&self, stored: &str, presented: &str) -> bool {
        match &self.cipher {
            Some(cipher) => cipher.matches(stored, presented),
            None => stored == presented,
        }
    }

    #[must_use]
    pub const fn encrypts_at_rest(&self) -> bool {
        self.cipher.is_some()
    }

    #[must_use]
    pub const fn uses_jwt_access_tokens(&self) -> bool {
        self.jwt.is_some()
    }

    /// Mint an access token string. In JWT mode the token is self-contained;
    /// otherwise it is an opaque random string that must be persisted.
    pub fn mint_access_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: &Scope,
        issued_at: i64,
        expires: i64,
    ) -> Result<String, CodecError> {
        match &self.jwt {
            Some(jwt) => jwt.encode(client_id, user_id, scope, issued_at, expires),
            None => self.generate_token(),
        }
    }

    /// Decode a JWT access token. `None` when JWT access tokens are disabled.
    pub fn decode_jwt_access_token(&self, token: &str) -> Option<Result<AccessToken, CodecError>> {
        self.jwt.as_ref().map(|jwt| jwt.decode(token))
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("encrypts_at_rest", &self.encrypts_at_rest())
            .field("jwt", &self.jwt)
            .finish()
    }
}

fn random_bytes(rng: &SystemRandom, len: usize) -> Result<Vec<u8>, CodecError> {
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)?;
    Ok(bytes)
}
