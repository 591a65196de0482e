//! Edge gateway for tradedesk.
//!
//! A single listening port in front of the tradedesk backends. It:
//!
//! - Routes requests by path prefix to the auth, account and client services
//! - Adds permissive CORS headers to every response and answers preflights
//! - Serves the built front-end bundle, falling back to the main document
//!   for client-side routes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    tradedesk-gateway                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Preflight  │ │ Route table │ │  Static bundle +    │    │
//! │  │  + CORS     │ │ + Forwarder │ │  SPA fallback       │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │  Auth    │   │ Account  │   │  Client  │
//!        │ service  │   │ service  │   │ service  │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tradedesk_gateway::{create_router, GatewayConfig, GatewayState, RouteTable};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let routes = RouteTable::new()
//!     .register("/api/auth", "http://localhost:8081")
//!     .register("/api/account", "http://localhost:8082")
//!     .register("/api/client", "http://localhost:8083");
//!
//! let state = GatewayState::new(routes, config)?;
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod config;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod state;

pub use config::{GatewayConfig, RouteConfig};
pub use error::ApiError;
pub use proxy::{Forwarder, RouteRule, RouteTable};
pub use routes::create_router;
pub use state::GatewayState;
