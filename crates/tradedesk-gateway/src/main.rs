//! Tradedesk Gateway - edge reverse proxy and static host
//!
//! This is the main entry point for the gateway service.
//!
//! # Configuration
//!
//! Defaults listen on `0.0.0.0:5000`, serve `./dist` and route to the
//! docker-compose service names. Override with `LISTEN_ADDR`, `STATIC_DIR`,
//! `AUTH_SERVICE_URL`, `ACCOUNT_SERVICE_URL`, `CLIENT_SERVICE_URL`,
//! `MAX_BODY_BYTES` and `UPSTREAM_TIMEOUT_SECONDS`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradedesk_gateway::{create_router, GatewayConfig, GatewayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tradedesk=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tradedesk Gateway");

    let config = GatewayConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        static_dir = %config.static_dir.display(),
        index = %config.index_path().display(),
        max_body_bytes = config.max_body_bytes,
        "Gateway configuration loaded"
    );

    if !config.index_path().is_file() {
        tracing::warn!(
            path = %config.index_path().display(),
            "Main document not found - SPA fallback will answer 404"
        );
    }

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::from_config(config)?;

    for rule in state.routes.rules() {
        tracing::info!(prefix = %rule.prefix, target = %rule.target, "Route registered");
    }

    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
