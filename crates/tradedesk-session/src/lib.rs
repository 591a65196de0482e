//! Client-side session lifecycle for tradedesk.
//!
//! This crate issues, verifies, attaches and invalidates the bearer token a
//! tradedesk client uses against the backends behind the edge gateway:
//!
//! - [`SessionStore`]: persisted holder for the token and username
//! - [`AuthSessionManager`]: login, registration, logout and startup verification
//! - [`AuthorizedClient`]: account-scoped calls with token attachment and 401 handling
//! - [`AccountApi`]: the account backend operations built on top of it
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐        ┌──────────────────┐
//! │ AuthSession      │        │ AuthorizedClient │──── SessionInvalidated ───▶ navigation
//! │ Manager          │        │                  │
//! └───┬─────────┬────┘        └────┬─────────┬───┘
//!     │         │   get/set/clear  │         │
//!     │         └──────▶┌──────────▼───┐     │
//!     │                 │ SessionStore │     │
//!     │                 └──────────────┘     │
//!     │ /api/auth                /api/account│
//!     ▼                                      ▼
//! ┌──────────────────────────────────────────────┐
//! │                 Edge gateway                 │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tradedesk_session::{
//!     AccountApi, AuthSessionManager, AuthorizedClient, ClientConfig, HttpAuthBackend,
//!     MemorySessionStore, SessionStore,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("http://localhost:5000");
//! let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
//!
//! let manager = AuthSessionManager::new(HttpAuthBackend::new(config.clone()), store.clone());
//! manager.login("alice", "secret").await?;
//!
//! let account = AccountApi::new(AuthorizedClient::new(&config, store));
//! let portfolio = account.portfolio().await?;
//! println!("{portfolio}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod account;
pub mod authorized;
pub mod client;
pub mod error;
pub mod manager;
pub mod store;

pub use account::{AccountApi, BuyRequest, SellRequest, DEFAULT_CRYPTO_IDS};
pub use authorized::{AuthorizedClient, SessionInvalidated};
pub use client::{
    verify_token, AuthBackend, HttpAuthBackend, IssuedToken, LoginRequest, RegisterRequest,
    ValidateResponse,
};
pub use error::{AuthError, AuthOperation, RequestError, Result};
pub use manager::{AuthSessionManager, SessionState, UserIdentity};
pub use store::{FileSessionStore, MemorySessionStore, SessionKey, SessionStore};

/// Route prefix of the auth backend on the gateway.
pub const AUTH_PREFIX: &str = "/api/auth";

/// Route prefix of the account backend on the gateway.
pub const ACCOUNT_PREFIX: &str = "/api/account";

/// Where the client finds the edge gateway.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the gateway (e.g., `http://localhost:5000`).
    pub gateway_url: String,
}

impl ClientConfig {
    /// Create a configuration for the gateway at `gateway_url`.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of an auth backend route.
    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}{AUTH_PREFIX}{path}", self.gateway_url)
    }

    /// URL of an account backend route.
    #[must_use]
    pub fn account_url(&self, path: &str) -> String {
        format!("{}{ACCOUNT_PREFIX}{path}", self.gateway_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:5000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.gateway_url, "http://localhost:5000");
    }

    #[test]
    fn config_urls() {
        let config = ClientConfig::new("http://gateway:5000/");
        assert_eq!(config.auth_url("/login"), "http://gateway:5000/api/auth/login");
        assert_eq!(
            config.account_url("/accounts/my-accounts"),
            "http://gateway:5000/api/account/accounts/my-accounts"
        );
        assert_eq!(config.account_url(""), "http://gateway:5000/api/account");
    }
}
