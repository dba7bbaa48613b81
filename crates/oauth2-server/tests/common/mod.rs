//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use oauth2_server::error::{StorageError, StorageResult};
use oauth2_server::http::{Request, Response};
use oauth2_server::models::{
    AccessToken, AuthorizationCode, Client, GrantType, RefreshToken, Scope, unix_now,
};
use oauth2_server::{Config, MemoryStorage, Server, Storage};

pub const CLIENT_ID: &str = "c1";
pub const CLIENT_SECRET: &str = "s1";
pub const REDIRECT_URI: &str = "https://app/cb";

/// Storage with the confidential client `c1`/`s1`, a public client `spa` and a
/// client `codes-only` that may not use refresh tokens.
pub async fn seeded_storage() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.register_client(Client::confidential(CLIENT_ID, CLIENT_SECRET, REDIRECT_URI)).await;
    storage.register_client(Client::confidential("c2", "s2", "https://other/cb")).await;
    storage.register_client(Client::public("spa", "https://spa/cb")).await;
    storage
        .register_client(
            Client::confidential("codes-only", "s3", "https://codes/cb")
                .with_grant_types([GrantType::AuthorizationCode]),
        )
        .await;
    storage
        .register_client(
            Client::confidential("reader", "s4", "https://reader/cb").with_scope(Scope::parse("read")),
        )
        .await;
    storage
}

pub async fn test_server(config: Config) -> Server {
    let storage: Arc<dyn Storage> = seeded_storage().await;
    Server::new(storage, config).unwrap()
}

/// Store an authorization code under its plaintext value `code`.
pub async fn seed_code(server: &Server, code: &str, client_id: &str, scope: &str) {
    let record = AuthorizationCode {
        code: server.codec().to_stored(code).unwrap(),
        client_id: client_id.into(),
        user_id: Some("u1".into()),
        redirect_uri: Some(REDIRECT_URI.into()),
        expires: unix_now() + 30,
        scope: Scope::parse(scope),
        code_challenge: None,
        code_challenge_method: None,
        used: false,
    };
    server.storage().set_authorization_code(record).await.unwrap();
}

pub async fn seed_code_record(server: &Server, mut record: AuthorizationCode) {
    record.code = server.codec().to_stored(&record.code).unwrap();
    server.storage().set_authorization_code(record).await.unwrap();
}

/// Store a refresh token under its plaintext value `token`.
pub async fn seed_refresh_token(server: &Server, token: &str, client_id: &str, scope: &str, expires: i64) {
    let record = RefreshToken {
        refresh_token: server.codec().to_stored(token).unwrap(),
        client_id: client_id.into(),
        user_id: Some("u1".into()),
        expires,
        scope: Scope::parse(scope),
    };
    server.storage().set_refresh_token(record).await.unwrap();
}

pub fn code_request(code: &str) -> Request {
    Request::post()
        .with_basic_auth(CLIENT_ID, CLIENT_SECRET)
        .with_body("grant_type", "authorization_code")
        .with_body("code", code)
        .with_body("redirect_uri", REDIRECT_URI)
}

pub fn refresh_request(token: &str) -> Request {
    Request::post()
        .with_basic_auth(CLIENT_ID, CLIENT_SECRET)
        .with_body("grant_type", "refresh_token")
        .with_body("refresh_token", token)
}

pub fn error_of(response: &Response) -> Option<&str> {
    response.parameter("error")
}

/// Wraps [`MemoryStorage`] and fails selected operations on demand.
#[derive(Default)]
pub struct FailingStorage {
    pub inner: MemoryStorage,
    pub fail_set_refresh_token: AtomicBool,
    pub fail_next_set_refresh_token: AtomicBool,
    pub fail_get_client: AtomicBool,
}

impl FailingStorage {
    pub fn fail_refresh_tokens(&self) {
        self.fail_set_refresh_token.store(true, Ordering::SeqCst);
    }

    /// Fail only the next `set_refresh_token` call.
    pub fn fail_next_refresh_token(&self) {
        self.fail_next_set_refresh_token.store(true, Ordering::SeqCst);
    }

    pub fn fail_clients(&self) {
        self.fail_get_client.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn get_client(&self, client_id: &str) -> StorageResult<Option<Client>> {
        if self.fail_get_client.load(Ordering::SeqCst) {
            return Err(StorageError::backend("connection refused to db.internal:5432"));
        }
        self.inner.get_client(client_id).await
    }

    async fn check_client_credentials(&self, client_id: &str, secret: Option<&str>) -> StorageResult<bool> {
        self.inner.check_client_credentials(client_id, secret).await
    }

    async fn check_restricted_grant_type(&self, client_id: &str, grant_type: GrantType) -> StorageResult<bool> {
        self.inner.check_restricted_grant_type(client_id, grant_type).await
    }

    async fn get_authorization_code(&self, code: &str) -> StorageResult<Option<AuthorizationCode>> {
        self.inner.get_authorization_code(code).await
    }

    async fn set_authorization_code(&self, code: AuthorizationCode) -> StorageResult<()> {
        self.inner.set_authorization_code(code).await
    }

    async fn mark_authorization_code_used(&self, code: &str) -> StorageResult<bool> {
        self.inner.mark_authorization_code_used(code).await
    }

    async fn get_access_token(&self, access_token: &str) -> StorageResult<Option<AccessToken>> {
        self.inner.get_access_token(access_token).await
    }

    async fn set_access_token(&self, token: AccessToken) -> StorageResult<()> {
        self.inner.set_access_token(token).await
    }

    async fn unset_access_token(&self, access_token: &str) -> StorageResult<bool> {
        self.inner.unset_access_token(access_token).await
    }

    async fn get_refresh_token(&self, refresh_token: &str) -> StorageResult<Option<RefreshToken>> {
        self.inner.get_refresh_token(refresh_token).await
    }

    async fn set_refresh_token(&self, token: RefreshToken) -> StorageResult<()> {
        if self.fail_set_refresh_token.load(Ordering::SeqCst)
            || self.fail_next_set_refresh_token.swap(false, Ordering::SeqCst)
        {
            return Err(StorageError::backend("unique index violated on oauth_refresh_tokens"));
        }
        self.inner.set_refresh_token(token).await
    }

    async fn unset_refresh_token(&self, refresh_token: &str) -> StorageResult<bool> {
        self.inner.unset_refresh_token(refresh_token).await
    }
}
