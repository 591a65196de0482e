//! Static bundle serving with single-page-application fallback.
//!
//! Files under the bundle directory are served as-is with a guessed content
//! type. Any path that names no file gets the main document with status 200,
//! whatever the method, so the client-side router can interpret the path.

use std::convert::Infallible;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::Service;
use tower_http::services::ServeDir;

use crate::config::GatewayConfig;
use crate::error::ApiError;

/// The static bundle service: real files first, then the main document.
pub type StaticAssets = ServeDir<SpaFallback>;

/// Build the static service for `config`.
#[must_use]
pub fn static_assets(config: &GatewayConfig) -> StaticAssets {
    ServeDir::new(&config.static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(SpaFallback::new(config.index_path()))
}

/// Serves the main document for any request.
#[derive(Debug, Clone)]
pub struct SpaFallback {
    index: Arc<PathBuf>,
}

impl SpaFallback {
    /// Create a fallback serving the file at `index`.
    #[must_use]
    pub fn new(index: PathBuf) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    async fn serve(index: Arc<PathBuf>) -> Response {
        match tokio::fs::read(index.as_path()).await {
            Ok(bytes) => (
                StatusCode::OK,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                )],
                Body::from(bytes),
            )
                .into_response(),
            Err(e) => {
                tracing::error!(path = %index.display(), error = %e, "Main document unavailable");
                ApiError::NotFound("index document".to_string()).into_response()
            }
        }
    }
}

impl<B> Service<Request<B>> for SpaFallback
where
    B: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        tracing::trace!(path = %req.uri().path(), "SPA fallback");
        let index = Arc::clone(&self.index);
        Box::pin(async move { Ok(Self::serve(index).await) })
    }
}
