// rest/mod.rs — HTTP surface of the daemon.
//
// Endpoints:
//   POST /webhook/gitea   (HMAC-authenticated push ingress)
//   GET  /health
//   GET  /metrics         (Prometheus text format)

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppContext;

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/webhook/gitea", post(routes::webhook::gitea_webhook))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve until `shutdown` resolves, then drain gracefully.
pub async fn serve(
    ctx: Arc<AppContext>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;

    let router = build_router(ctx);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("http listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
