//! Prefix routing and upstream forwarding.
//!
//! The [`RouteTable`] is built once at startup and then shared read-only.
//! The [`Forwarder`] relays a matched request to exactly one backend and
//! hands the backend's answer back without transforming it.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::response::Response;

use crate::config::RouteConfig;
use crate::error::ApiError;

/// Request headers that describe the inbound connection, not the message.
static HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Response headers dropped because the body is re-framed by the gateway.
static RESPONSE_REFRAMED: [HeaderName; 2] = [header::CONNECTION, header::TRANSFER_ENCODING];

/// A single prefix → backend rule. The path is forwarded unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Path prefix, without a trailing slash.
    pub prefix: String,
    /// Backend base URL, without a trailing slash.
    pub target: String,
}

impl RouteRule {
    /// Whether `path` falls under this rule's prefix.
    ///
    /// The prefix must be followed by the end of the path or a `/`, so
    /// `/api/auth` covers `/api/auth` and `/api/auth/login` but not
    /// `/api/authority`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Upstream URL for a request path and optional query string.
    #[must_use]
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}{path}?{q}", self.target),
            None => format!("{}{path}", self.target),
        }
    }
}

/// Ordered set of route rules; the first matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from configuration, keeping the configured order.
    #[must_use]
    pub fn from_config(routes: &[RouteConfig]) -> Self {
        routes.iter().fold(Self::new(), |table, route| {
            table.register(&route.prefix, &route.target)
        })
    }

    /// Append a rule. Rules are evaluated in registration order.
    #[must_use]
    pub fn register(mut self, prefix: &str, target: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let prefix = if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        };

        self.rules.push(RouteRule {
            prefix,
            target: target.trim_end_matches('/').to_string(),
        });
        self
    }

    /// The first rule whose prefix covers `path`.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    /// All rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

/// Relays requests to backends over a shared connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl Forwarder {
    /// Create a forwarder.
    ///
    /// Redirects are never followed: a backend's 3xx goes back to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        timeout: Duration,
        connect_timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ApiError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }

    /// Forward `request` to `rule`'s backend and relay the answer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::UpstreamUnavailable` or `ApiError::UpstreamTimeout`
    /// when the backend cannot be reached; the request is not retried.
    pub async fn forward(&self, rule: &RouteRule, request: Request) -> Result<Response, ApiError> {
        let (parts, body) = request.into_parts();
        let url = rule.upstream_url(parts.uri.path(), parts.uri.query());

        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|_| ApiError::PayloadTooLarge)?;

        let mut upstream = self
            .client
            .request(parts.method.clone(), &url)
            .headers(forwardable(&parts.headers, &HOP_BY_HOP));
        if !body.is_empty() {
            upstream = upstream.body(body);
        }

        tracing::debug!(
            method = %parts.method,
            prefix = %rule.prefix,
            upstream = %url,
            "Forwarding request"
        );

        let response = upstream.send().await.map_err(|e| {
            tracing::error!(
                prefix = %rule.prefix,
                upstream = %url,
                error = %e,
                "Upstream request failed"
            );
            ApiError::from_upstream(&rule.target, &e)
        })?;

        relay(response, &rule.target).await
    }
}

/// Copy every header not listed in `skip`.
fn forwardable(headers: &HeaderMap, skip: &[HeaderName]) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !skip.contains(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Convert the backend's response into ours: same status, headers and body.
async fn relay(response: reqwest::Response, target: &str) -> Result<Response, ApiError> {
    let status = response.status();
    let headers = forwardable(response.headers(), &RESPONSE_REFRAMED);

    let body: Bytes = response.bytes().await.map_err(|e| {
        tracing::error!(upstream = %target, error = %e, "Failed to read upstream body");
        ApiError::from_upstream(target, &e)
    })?;

    let mut relayed = Response::new(Body::from(body));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;
    Ok(relayed)
}
