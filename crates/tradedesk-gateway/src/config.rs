//! Gateway configuration types.
//!
//! This module defines configuration structures for the edge gateway.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// One prefix → backend mapping as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    /// Path prefix, e.g. `/api/auth`.
    pub prefix: String,
    /// Backend base URL, e.g. `http://auth-service:8081`.
    pub target: String,
}

impl RouteConfig {
    /// Create a route config.
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            target: target.into(),
        }
    }
}

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:5000").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Directory holding the built front-end bundle.
    #[serde(default = "GatewayConfig::default_static_dir")]
    pub static_dir: PathBuf,

    /// Main document served for unmatched paths, relative to `static_dir`.
    #[serde(default = "GatewayConfig::default_index_file")]
    pub index_file: String,

    /// Route rules, evaluated in order.
    #[serde(default = "GatewayConfig::default_routes")]
    pub routes: Vec<RouteConfig>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Upstream request timeout in seconds.
    #[serde(default = "GatewayConfig::default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,

    /// Upstream connect timeout in seconds.
    #[serde(default = "GatewayConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:5000".to_string()
    }

    fn default_static_dir() -> PathBuf {
        PathBuf::from("dist")
    }

    fn default_index_file() -> String {
        "index.html".to_string()
    }

    fn default_routes() -> Vec<RouteConfig> {
        vec![
            RouteConfig::new("/api/auth", "http://auth-service:8081"),
            RouteConfig::new("/api/account", "http://account-service:8082"),
            RouteConfig::new("/api/client", "http://client-service:8083"),
        ]
    }

    const fn default_max_body() -> usize {
        10 * 1024 * 1024 // 10 MB
    }

    const fn default_upstream_timeout() -> u64 {
        60
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    /// Build a configuration from defaults overlaid with environment variables.
    ///
    /// Recognised variables: `LISTEN_ADDR`, `STATIC_DIR`, `INDEX_FILE`,
    /// `AUTH_SERVICE_URL`, `ACCOUNT_SERVICE_URL`, `CLIENT_SERVICE_URL`,
    /// `MAX_BODY_BYTES`, `UPSTREAM_TIMEOUT_SECONDS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(index) = lookup("INDEX_FILE") {
            config.index_file = index;
        }

        let overrides = [
            ("/api/auth", "AUTH_SERVICE_URL"),
            ("/api/account", "ACCOUNT_SERVICE_URL"),
            ("/api/client", "CLIENT_SERVICE_URL"),
        ];
        for (prefix, var) in overrides {
            if let Some(target) = lookup(var) {
                if let Some(route) = config.routes.iter_mut().find(|r| r.prefix == prefix) {
                    route.target = target;
                }
            }
        }

        if let Some(max) = lookup("MAX_BODY_BYTES").and_then(|v| v.parse().ok()) {
            config.max_body_bytes = max;
        }
        if let Some(secs) = lookup("UPSTREAM_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            config.upstream_timeout_seconds = secs;
        }

        config
    }

    /// Full path of the main document.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.static_dir.join(&self.index_file)
    }

    /// Get the upstream timeout as a `Duration`.
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }

    /// Get the upstream connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            static_dir: Self::default_static_dir(),
            index_file: Self::default_index_file(),
            routes: Self::default_routes(),
            max_body_bytes: Self::default_max_body(),
            upstream_timeout_seconds: Self::default_upstream_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}
