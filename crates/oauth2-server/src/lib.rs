//! OAuth 2.0 Authorization Server
//!
//! The security-critical core of an OAuth 2.0 deployment: client authentication,
//! the authorization code and refresh token grants, token minting and the storage
//! contract that keeps issued tokens consistent.
//!
//! # Features
//!
//! - **Grants**: `authorization_code` (with PKCE) and `refresh_token` with rotation
//! - **Single-use codes**: redemption is an atomic compare-and-set in storage
//! - **Tokens at rest**: opaque tokens stored encrypted with AES-256-GCM
//! - **JWT mode**: optional self-contained HS256 access tokens
//! - **Transport neutral**: grant logic sees only [`http::Request`] and [`http::Response`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use oauth2_server::{Config, MemoryStorage, Server, http::Request, models::Client};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(MemoryStorage::new());
//!     storage.register_client(Client::confidential("c1", "s1", "https://app/cb")).await;
//!
//!     let server = Server::new(storage, Config::from_env()?)?;
//!     let request = Request::post()
//!         .with_basic_auth("c1", "s1")
//!         .with_body("grant_type", "refresh_token")
//!         .with_body("refresh_token", "...");
//!     let response = server.handle_token_request(&request).await;
//!     println!("{}", response.status());
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod grant;
pub mod http;
pub mod models;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{ErrorCode, GrantError, OAuthError, StorageError};
pub use grant::TokenOutcome;
pub use server::Server;
pub use storage::{MemoryStorage, Storage};
