//! Auth session manager.
//!
//! Owns the client's [`SessionState`] and every transition between states.
//!
//! # State Machine
//!
//! ```text
//!   ┌─────────────────┐  persisted token   ┌─────────────┐
//!   │ Unauthenticated │───────────────────▶│  Verifying  │
//!   └─────────────────┘                    └──────┬──────┘
//!       ▲   │                        valid │      │ invalid / error
//!       │   │ login / register             ▼      │
//!       │   └────────────────────▶┌───────────────┴─┐
//!       │                         │  Authenticated  │
//!       └─────────────────────────┴─────────────────┘
//!          logout / invalidation / failed verify
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::watch;

use crate::authorized::SessionInvalidated;
use crate::client::{verify_token, AuthBackend, LoginRequest, RegisterRequest};
use crate::error::Result;
use crate::store::{SessionKey, SessionStore};

/// Display name used when a verified session has no stored username.
const FALLBACK_USERNAME: &str = "User";

/// The signed-in user, as far as the client knows.
///
/// Derived from the login/registration response or from storage; never
/// checked against the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Display name.
    pub username: String,
}

impl UserIdentity {
    /// Create an identity for `username`.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Client session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No trusted token.
    Unauthenticated,
    /// A persisted token is being checked against the backend.
    Verifying,
    /// The stored token is trusted.
    Authenticated(UserIdentity),
}

impl SessionState {
    /// Returns `true` for `Authenticated`.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Orchestrates login, registration, logout and startup verification.
///
/// The manager holds no token of its own: every read goes to the injected
/// [`SessionStore`].
pub struct AuthSessionManager<B: AuthBackend> {
    backend: B,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
}

impl<B: AuthBackend> AuthSessionManager<B> {
    /// Create a manager in the `Unauthenticated` state.
    #[must_use]
    pub fn new(backend: B, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            backend,
            store,
            state,
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The signed-in user, if the session is authenticated.
    #[must_use]
    pub fn current_user(&self) -> Option<UserIdentity> {
        match &*self.state.borrow() {
            SessionState::Authenticated(user) => Some(user.clone()),
            SessionState::Unauthenticated | SessionState::Verifying => None,
        }
    }

    /// Returns `true` if the session is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// The persisted username, regardless of state.
    #[must_use]
    pub fn stored_user(&self) -> Option<UserIdentity> {
        self.store.get(SessionKey::Username).map(UserIdentity::new)
    }

    fn transition(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!(from = ?current, to = ?next, "Session state transition");
            *current = next;
            true
        });
    }

    /// Log in with a username and password.
    ///
    /// On success the token and username are written to the store and the
    /// session becomes `Authenticated`. On failure the store is untouched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` whose message is the backend's own reason when it
    /// gave one, or `"Login failed"` otherwise.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserIdentity> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let issued = self.backend.login(&req).await.inspect_err(|e| {
            tracing::info!(username = %username, error = %e, "Login failed");
        })?;

        let user = UserIdentity::new(issued.username.unwrap_or_else(|| username.to_string()));
        self.store.set_credentials(&issued.token, &user.username);
        self.transition(SessionState::Authenticated(user.clone()));

        tracing::info!(username = %user.username, "Logged in");
        Ok(user)
    }

    /// Register a new account and start a session for it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` whose message is the backend's own reason when it
    /// gave one, or `"Registration failed"` otherwise.
    pub async fn register(&self, req: &RegisterRequest) -> Result<UserIdentity> {
        let issued = self.backend.register(req).await.inspect_err(|e| {
            tracing::info!(username = %req.username, error = %e, "Registration failed");
        })?;

        let user = UserIdentity::new(issued.username.unwrap_or_else(|| req.username.clone()));
        self.store.set_credentials(&issued.token, &user.username);
        self.transition(SessionState::Authenticated(user.clone()));

        tracing::info!(username = %user.username, "Registered");
        Ok(user)
    }

    /// End the session. Purely local; no request is made.
    pub fn logout(&self) {
        self.store.clear();
        self.transition(SessionState::Unauthenticated);
        tracing::info!("Logged out");
    }

    /// Check a persisted token once at process start.
    ///
    /// With no stored token this goes straight to `Unauthenticated`.
    /// Otherwise the token is validated; a valid token yields
    /// `Authenticated`, and anything else clears the store.
    pub async fn verify_startup_token(&self) -> SessionState {
        let Some(token) = self.store.token() else {
            self.transition(SessionState::Unauthenticated);
            return self.state();
        };

        self.transition(SessionState::Verifying);

        if verify_token(&self.backend, Some(&token)).await {
            let user = self
                .stored_user()
                .unwrap_or_else(|| UserIdentity::new(FALLBACK_USERNAME));
            tracing::info!(username = %user.username, "Stored session verified");
            self.transition(SessionState::Authenticated(user));
        } else {
            tracing::info!("Stored session rejected, clearing");
            self.store.clear();
            self.transition(SessionState::Unauthenticated);
        }

        self.state()
    }

    /// React to an invalidation signal from the authorized client.
    ///
    /// The client has already cleared the store; this only moves the state.
    pub fn handle_invalidated(&self, event: &SessionInvalidated) {
        tracing::info!(path = %event.path, "Session invalidated by backend");
        self.transition(SessionState::Unauthenticated);
    }

    /// Apply every invalidation signal already queued on `events`.
    ///
    /// Returns the last signal seen. A lagged receiver still means at least
    /// one 401 happened, so it also ends the session.
    pub fn drain_invalidations(
        &self,
        events: &mut broadcast::Receiver<SessionInvalidated>,
    ) -> Option<SessionInvalidated> {
        let mut last = None;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.handle_invalidated(&event);
                    last = Some(event);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Invalidation receiver lagged");
                    self.transition(SessionState::Unauthenticated);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        last
    }
}
