//! Gateway application state.
//!
//! This module defines the shared state that is available to the dispatcher.

use std::sync::Arc;

use crate::assets::{static_assets, StaticAssets};
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::proxy::{Forwarder, RouteTable};

/// Shared application state for the gateway.
///
/// The route table is frozen here; nothing mutates it after startup.
#[derive(Clone)]
pub struct GatewayState {
    /// Prefix rules, evaluated in order.
    pub routes: Arc<RouteTable>,
    /// Upstream HTTP forwarder.
    pub forwarder: Forwarder,
    /// Static bundle with SPA fallback.
    pub assets: StaticAssets,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a gateway state with an explicit route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be created.
    pub fn new(routes: RouteTable, config: GatewayConfig) -> Result<Self, ApiError> {
        let forwarder = Forwarder::new(
            config.upstream_timeout(),
            config.connect_timeout(),
            config.max_body_bytes,
        )?;

        Ok(Self {
            routes: Arc::new(routes),
            forwarder,
            assets: static_assets(&config),
            config,
        })
    }

    /// Create a gateway state with the routes listed in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be created.
    pub fn from_config(config: GatewayConfig) -> Result<Self, ApiError> {
        let routes = RouteTable::from_config(&config.routes);
        Self::new(routes, config)
    }
}
