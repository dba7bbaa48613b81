//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Implements S256 and plain code challenge verification per RFC 7636.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::models::CodeChallengeMethod;

/// Whether `value` is a syntactically valid verifier or challenge:
/// 43 to 128 characters from the unreserved set.
pub fn is_well_formed(value: &str) -> bool {
    (43..=128).contains(&value.len())
        && value.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// Verify a PKCE S256 code challenge.
///
/// Computes `BASE64URL(SHA256(code_verifier))` and compares to the stored challenge.
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    let hash = Sha256::digest(code_verifier.as_bytes());
    let computed = URL_SAFE_NO_PAD.encode(hash);
    computed == code_challenge
}

/// Verify `code_verifier` against a recorded challenge.
pub fn verify(method: CodeChallengeMethod, code_verifier: &str, code_challenge: &str) -> bool {
    if !is_well_formed(code_verifier) {
        return false;
    }
    match method {
        CodeChallengeMethod::S256 => verify_s256(code_verifier, code_challenge),
        CodeChallengeMethod::Plain => code_verifier == code_challenge,
    }
}
