//! Session context for one CLI invocation.
//!
//! Bundles the session manager, the authorized account client and the
//! receiving end of the invalidation channel. The CLI has no screens, so
//! "navigating to login" means telling the user to run `tradedesk login`.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use tradedesk_session::{
    AccountApi, AuthSessionManager, AuthorizedClient, ClientConfig, FileSessionStore,
    HttpAuthBackend, SessionInvalidated, SessionState, SessionStore, UserIdentity,
};

/// Message shown whenever a command needs a fresh login.
pub const LOGIN_GUIDANCE: &str = "Run `tradedesk login` to sign in.";

/// Everything a command needs to talk to the gateway as the current user.
pub struct Session {
    manager: AuthSessionManager<HttpAuthBackend>,
    account: AccountApi,
    invalidations: broadcast::Receiver<SessionInvalidated>,
    store: Arc<FileSessionStore>,
}

impl Session {
    /// Open the session persisted at `store_path`, talking to `gateway_url`.
    pub fn open(gateway_url: &str, store_path: &Path) -> Self {
        let config = ClientConfig::new(gateway_url);
        let store = Arc::new(FileSessionStore::open(store_path));
        let shared: Arc<dyn SessionStore> = store.clone();

        let client = AuthorizedClient::new(&config, Arc::clone(&shared));
        let invalidations = client.subscribe();

        Self {
            manager: AuthSessionManager::new(HttpAuthBackend::new(config), shared),
            account: AccountApi::new(client),
            invalidations,
            store,
        }
    }

    /// The session manager.
    pub fn manager(&self) -> &AuthSessionManager<HttpAuthBackend> {
        &self.manager
    }

    /// Account operations, authorized with the stored token.
    pub fn account(&self) -> &AccountApi {
        &self.account
    }

    /// Where the session is persisted.
    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    /// Guard for protected commands.
    ///
    /// Verifies the stored token once and returns the identity, or an error
    /// telling the user to log in.
    pub async fn require_login(&self) -> anyhow::Result<UserIdentity> {
        match self.manager.verify_startup_token().await {
            SessionState::Authenticated(user) => Ok(user),
            SessionState::Unauthenticated | SessionState::Verifying => {
                anyhow::bail!("Not logged in. {LOGIN_GUIDANCE}")
            }
        }
    }

    /// Apply pending invalidation signals to the manager.
    ///
    /// Returns the path of the request that was rejected, if any.
    pub fn drain_invalidations(&mut self) -> Option<String> {
        self.manager
            .drain_invalidations(&mut self.invalidations)
            .map(|event| event.path)
    }
}
