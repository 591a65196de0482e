//! Router configuration.
//!
//! The gateway has no fixed routes. Every request reaches [`dispatch`],
//! which consults the route table and otherwise falls back to the static
//! bundle. Middleware adds the preflight short-circuit and the CORS headers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceExt;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::GatewayState;

/// `Access-Control-Allow-Origin` value on every response.
pub const ALLOW_ORIGIN: &str = "*";
/// `Access-Control-Allow-Headers` value on every response.
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";
/// `Access-Control-Allow-Methods` value on every response.
pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Create the gateway router with all middleware.
///
/// # Request handling
///
/// 1. `OPTIONS` to any path answers 200 with an empty body.
/// 2. A path under a registered prefix is forwarded to that prefix's backend.
/// 3. A path naming a file in the bundle serves that file.
/// 4. Anything else serves the main document.
///
/// Every response, including errors, carries the three CORS headers.
pub fn create_router(state: GatewayState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    let state = Arc::new(state);

    Router::new()
        .fallback(dispatch)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        // Outside the body limit: a preflight never has its body inspected.
        .layer(middleware::from_fn(preflight))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .with_state(state)
}

/// Answer CORS preflight requests without routing them.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        tracing::trace!(path = %request.uri().path(), "Preflight short-circuit");
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

/// Route one request: backend on a prefix match, otherwise the static bundle.
pub async fn dispatch(State(state): State<Arc<GatewayState>>, request: Request) -> Response {
    if let Some(rule) = state.routes.match_path(request.uri().path()) {
        return match state.forwarder.forward(rule, request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
    }

    match state.assets.clone().oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
