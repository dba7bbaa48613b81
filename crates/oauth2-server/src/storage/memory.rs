//! In-memory storage backend.
//!
//! Each table sits behind its own `RwLock`; every check-and-mutate operation
//! holds the write lock for its whole duration, which is what makes code
//! redemption and refresh-token rotation atomic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::Storage;
use crate::error::{StorageError, StorageResult};
use crate::models::{
    AccessToken, AuthorizationCode, Client, GrantType, RefreshToken, unix_now,
};

/// Cleanup interval: 5 minutes.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Record counts, for readiness reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub clients: usize,
    pub authorization_codes: usize,
    pub access_tokens: usize,
    pub refresh_tokens: usize,
}

/// In-memory OAuth state store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    clients: Arc<RwLock<HashMap<String, Client>>>,
    auth_codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
    access_tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    refresh_tokens: Arc<RwLock<HashMap<String, RefreshToken>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a client.
    pub async fn register_client(&self, client: Client) {
        tracing::debug!(client_id = %client.client_id, public = client.is_public(), "Registered client");
        self.clients.write().await.insert(client.client_id.clone(), client);
    }

    /// Number of records currently held, expired ones included.
    pub async fn stats(&self) -> StoreStats {
        StoreStats {
            clients: self.clients.read().await.len(),
            authorization_codes: self.auth_codes.read().await.len(),
            access_tokens: self.access_tokens.read().await.len(),
            refresh_tokens: self.refresh_tokens.read().await.len(),
        }
    }

    /// Start background cleanup task for expired tokens and codes.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        });
    }

    /// Drop expired records.
    pub async fn cleanup_expired(&self) {
        let now = unix_now();

        {
            let mut codes = self.auth_codes.write().await;
            let before = codes.len();
            codes.retain(|_, code| !code.is_expired(now));
            log_removed("authorization codes", before - codes.len());
        }

        {
            let mut tokens = self.access_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, token| !token.is_expired(now));
            log_removed("access tokens", before - tokens.len());
        }

        {
            let mut tokens = self.refresh_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, token| !token.is_expired(now));
            log_removed("refresh tokens", before - tokens.len());
        }
    }
}

fn log_removed(kind: &str, count: usize) {
    if count > 0 {
        tracing::debug!(count, kind, "Cleaned up expired records");
    }
}

/// Compare secrets through their digests so the comparison time does not depend
/// on how much of the secret matched.
fn secrets_match(expected: &str, presented: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(presented.as_bytes())
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_client(&self, client_id: &str) -> StorageResult<Option<Client>> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn check_client_credentials(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> StorageResult<bool> {
        let clients = self.clients.read().await;
        let Some(client) = clients.get(client_id) else {
            return Ok(false);
        };
        let presented = client_secret.unwrap_or_default();
        Ok(match client.client_secret.as_deref() {
            Some(expected) if !expected.is_empty() => secrets_match(expected, presented),
            _ => presented.is_empty(),
        })
    }

    async fn check_restricted_grant_type(
        &self,
        client_id: &str,
        grant_type: GrantType,
    ) -> StorageResult<bool> {
        Ok(self
            .clients
            .read()
            .await
            .get(client_id)
            .is_some_and(|client| client.allows_grant_type(grant_type)))
    }

    async fn get_authorization_code(&self, code: &str) -> StorageResult<Option<AuthorizationCode>> {
        let now = unix_now();
        Ok(self.auth_codes.read().await.get(code).filter(|c| c.is_redeemable(now)).cloned())
    }

    async fn set_authorization_code(&self, code: AuthorizationCode) -> StorageResult<()> {
        let now = unix_now();
        let mut codes = self.auth_codes.write().await;
        if codes.get(&code.code).is_some_and(|existing| !existing.is_expired(now)) {
            return Err(StorageError::conflict("authorization code"));
        }
        codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn mark_authorization_code_used(&self, code: &str) -> StorageResult<bool> {
        let now = unix_now();
        let mut codes = self.auth_codes.write().await;
        match codes.get_mut(code) {
            Some(record) if record.is_redeemable(now) => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_access_token(&self, access_token: &str) -> StorageResult<Option<AccessToken>> {
        let now = unix_now();
        Ok(self.access_tokens.read().await.get(access_token).filter(|t| !t.is_expired(now)).cloned())
    }

    async fn set_access_token(&self, token: AccessToken) -> StorageResult<()> {
        let now = unix_now();
        let mut tokens = self.access_tokens.write().await;
        if tokens.get(&token.access_token).is_some_and(|existing| !existing.is_expired(now)) {
            return Err(StorageError::conflict("access token"));
        }
        tokens.insert(token.access_token.clone(), token);
        Ok(())
    }

    async fn unset_access_token(&self, access_token: &str) -> StorageResult<bool> {
        Ok(self.access_tokens.write().await.remove(access_token).is_some())
    }

    async fn get_refresh_token(&self, refresh_token: &str) -> StorageResult<Option<RefreshToken>> {
        let now = unix_now();
        Ok(self
            .refresh_tokens
            .read()
            .await
            .get(refresh_token)
            .filter(|t| !t.is_expired(now))
            .cloned())
    }

    async fn set_refresh_token(&self, token: RefreshToken) -> StorageResult<()> {
        let now = unix_now();
        let mut tokens = self.refresh_tokens.write().await;
        if tokens.get(&token.refresh_token).is_some_and(|existing| !existing.is_expired(now)) {
            return Err(StorageError::conflict("refresh token"));
        }
        tokens.insert(token.refresh_token.clone(), token);
        Ok(())
    }

    async fn unset_refresh_token(&self, refresh_token: &str) -> StorageResult<bool> {
        let now = unix_now();
        let mut tokens = self.refresh_tokens.write().await;
        Ok(tokens.remove(refresh_token).is_some_and(|token| !token.is_expired(now)))
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage").finish()
    }
}
