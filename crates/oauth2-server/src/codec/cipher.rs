//! At-rest encryption of token strings.
//!
//! The stored form is `base64url(nonce || AES-256-GCM(token) || tag)` where the
//! nonce is derived from an HMAC of the token. Equal tokens therefore seal to equal
//! stored strings, which lets the sealed value double as the storage key.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::{aead, hkdf, hmac};

use crate::error::CodecError;

const HKDF_SALT: &[u8] = b"oauth2-server/token-cipher/v1";
const ENCRYPTION_INFO: &[&[u8]] = &[b"token encryption"];
const NONCE_INFO: &[&[u8]] = &[b"token nonce"];
const AAD: &[u8] = b"oauth2-server:token:v1";

/// Seals and opens stored token strings with keys derived from a server secret.
pub struct TokenCipher {
    key: aead::LessSafeKey,
    nonce_key: hmac::Key,
}

impl TokenCipher {
    /// Derive the encryption and nonce keys from `secret` with HKDF-SHA256.
    pub fn new(secret: &[u8]) -> Result<Self, CodecError> {
        let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT).extract(secret);
        let key = aead::UnboundKey::from(prk.expand(ENCRYPTION_INFO, &aead::AES_256_GCM)?);
        let nonce_key = hmac::Key::from(prk.expand(NONCE_INFO, hmac::HMAC_SHA256)?);
        Ok(Self { key: aead::LessSafeKey::new(key), nonce_key })
    }

    /// Encrypt a token into its stored form.
    pub fn seal(&self, token: &str) -> Result<String, CodecError> {
        let tag = hmac::sign(&self.nonce_key, token.as_bytes());
        let mut nonce = [0u8; aead::NONCE_LEN];
        nonce.copy_from_slice(&tag.as_ref()[..aead::NONCE_LEN]);

        let mut in_out = token.as_bytes().to_vec();
        self.key.seal_in_place_append_tag(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::from(AAD),
            &mut in_out,
        )?;

        let mut sealed = Vec::with_capacity(aead::NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&in_out);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Decrypt a stored token. Fails on tampering or a foreign key.
    pub fn open(&self, stored: &str) -> Result<String, CodecError> {
        let bytes = URL_SAFE_NO_PAD.decode(stored).map_err(|_| CodecError::Malformed)?;
        if bytes.len() < aead::NONCE_LEN + self.key.algorithm().tag_len() {
            return Err(CodecError::Malformed);
        }

        let (nonce, ciphertext) = bytes.split_at(aead::NONCE_LEN);
        let nonce = aead::Nonce::try_assume_unique_for_key(nonce)?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = self.key.open_in_place(nonce, aead::Aad::from(AAD), &mut in_out)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CodecError::Malformed)
    }

    /// Decrypt `stored` and compare it with `presented` in constant time.
    pub fn matches(&self, stored: &str, presented: &str) -> bool {
        let Ok(plaintext) = self.open(stored) else {
            return false;
        };
        let expected = hmac::sign(&self.nonce_key, plaintext.as_bytes());
        hmac::verify(&self.nonce_key, presented.as_bytes(), expected.as_ref()).is_ok()
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}
