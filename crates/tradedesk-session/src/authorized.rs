//! Authorized client for the account-scoped backend.
//!
//! Every call reads the token from the [`SessionStore`] right before it is
//! sent. A 401 answer tears the session down and announces it on a
//! broadcast channel; whoever drives navigation subscribes to that.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::RequestError;
use crate::store::SessionStore;
use crate::ClientConfig;

/// Capacity of the invalidation channel.
const EVENT_CAPACITY: usize = 16;

/// Emitted once per 401 response from an authorized call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInvalidated {
    /// Path of the request that was rejected.
    pub path: String,
    /// When the rejection was observed.
    pub at: DateTime<Utc>,
}

impl SessionInvalidated {
    /// Create an event for `path`, timestamped now.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            at: Utc::now(),
        }
    }
}

/// Error body the account backend may send.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client that attaches the session token and reacts to 401.
#[derive(Clone)]
pub struct AuthorizedClient {
    client: reqwest::Client,
    base_url: String,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionInvalidated>,
}

impl AuthorizedClient {
    /// Create a client for the account-scoped backend behind the gateway.
    #[must_use]
    pub fn new(config: &ClientConfig, store: Arc<dyn SessionStore>) -> Self {
        Self::with_client(reqwest::Client::new(), config, store)
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        config: &ClientConfig,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            base_url: config.account_url(""),
            store,
            events,
        }
    }

    /// Subscribe to session invalidation events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionInvalidated> {
        self.events.subscribe()
    }

    /// Build a request with the current token attached, if there is one.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);

        match self.store.token() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => {
                tracing::debug!(path = %path, "No session token, sending anonymous request");
                builder
            }
        }
    }

    /// Send a request and apply the 401 policy.
    ///
    /// Returns the response untouched when the status is a success.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Unauthorized` after clearing the session on
    /// 401, `RequestError::Status` for other failures, and
    /// `RequestError::Http` when the request could not be sent.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, RequestError> {
        let mut builder = self.request(method.clone(), path);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!(method = %method, path = %path, status = %status, "Account request completed");

        if status == StatusCode::UNAUTHORIZED {
            self.invalidate(path);
            return Err(RequestError::Unauthorized {
                path: path.to_string(),
            });
        }

        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.message.or(body.error),
                Err(_) => None,
            }
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });
            return Err(RequestError::Status { status, message });
        }

        Ok(response)
    }

    /// Clear the session and emit one `SessionInvalidated`.
    fn invalidate(&self, path: &str) {
        tracing::warn!(path = %path, "Account backend answered 401, clearing session");
        self.store.clear();
        if self.events.send(SessionInvalidated::new(path)).is_err() {
            tracing::debug!("No invalidation subscribers");
        }
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// See [`AuthorizedClient::send`]; also fails if the body is not valid
    /// JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let response = self.send(Method::GET, path, query, None).await?;
        decode(response).await
    }

    /// `POST` a JSON body and decode the JSON answer.
    ///
    /// # Errors
    ///
    /// See [`AuthorizedClient::send`]; also fails if the body is not valid
    /// JSON for `T`.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, RequestError> {
        let response = self.send(Method::POST, path, &[], Some(body)).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RequestError> {
    response
        .json()
        .await
        .map_err(|e| RequestError::Parse(e.to_string()))
}
