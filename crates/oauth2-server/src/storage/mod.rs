//! Storage contract for clients, authorization codes and tokens.
//!
//! Token and code arguments are always in their stored form (see
//! [`crate::codec::TokenCodec::to_stored`]). With encryption at rest that form
//! is [`crate::codec::STORED_TOKEN_LEN`] characters rather than the 40 of a raw
//! token, so persistent backends must size their key columns for it. Every lookup treats expired records
//! as absent; backends may also purge them, but correctness never depends on it.

mod memory;

pub use memory::{MemoryStorage, StoreStats};

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{AccessToken, AuthorizationCode, Client, GrantType, RefreshToken};

/// Capability set a storage backend must implement.
///
/// Uniqueness is enforced here: every `set_*` fails with
/// [`StorageError::Conflict`](crate::error::StorageError::Conflict) instead of
/// overwriting an existing record.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up a client by ID.
    async fn get_client(&self, client_id: &str) -> StorageResult<Option<Client>>;

    /// Check a client's secret. Public clients match only an absent or empty secret.
    async fn check_client_credentials(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> StorageResult<bool>;

    /// Whether the client may use `grant_type`.
    async fn check_restricted_grant_type(
        &self,
        client_id: &str,
        grant_type: GrantType,
    ) -> StorageResult<bool>;

    /// Fetch an unexpired, unused authorization code.
    async fn get_authorization_code(&self, code: &str) -> StorageResult<Option<AuthorizationCode>>;

    /// Persist a new authorization code.
    async fn set_authorization_code(&self, code: AuthorizationCode) -> StorageResult<()>;

    /// Atomically mark a code as used.
    ///
    /// Returns `true` only for the one caller that moved the code from unused to
    /// used; concurrent or repeated calls get `false`.
    async fn mark_authorization_code_used(&self, code: &str) -> StorageResult<bool>;

    /// Fetch an unexpired access token.
    async fn get_access_token(&self, access_token: &str) -> StorageResult<Option<AccessToken>>;

    /// Persist a new access token.
    async fn set_access_token(&self, token: AccessToken) -> StorageResult<()>;

    /// Delete an access token. Returns whether this call removed it.
    async fn unset_access_token(&self, access_token: &str) -> StorageResult<bool>;

    /// Fetch an unexpired refresh token.
    async fn get_refresh_token(&self, refresh_token: &str) -> StorageResult<Option<RefreshToken>>;

    /// Persist a new refresh token.
    async fn set_refresh_token(&self, token: RefreshToken) -> StorageResult<()>;

    /// Delete a refresh token. Returns whether this call removed it, so two
    /// concurrent rotations of the same token cannot both succeed.
    async fn unset_refresh_token(&self, refresh_token: &str) -> StorageResult<bool>;
}
