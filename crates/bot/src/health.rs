use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

pub const LIVENESS_BODY: &str = "Bot is running!";

fn router() -> Router {
    Router::new().route("/", get(|| async { LIVENESS_BODY }))
}

/// Answers hosting-platform health checks on `addr` until the process exits.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding liveness endpoint on {addr}"))?;
    serve_on(listener).await
}

async fn serve_on(listener: TcpListener) -> Result<()> {
    info!(addr = %listener.local_addr()?, "Liveness endpoint listening");
    axum::serve(listener, router())
        .await
        .context("liveness endpoint stopped")
}
