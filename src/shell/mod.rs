//! Offline shell: a caching front for the web client.
//!
//! Sits between the browser and the frontend origin. GET responses are
//! served stale-while-revalidate from a versioned cache; everything else is
//! forwarded untouched.

mod cache;
mod handlers;

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use cache::{CACHE_VERSION, CachedResponse, SHELL_URLS, ShellCache};
pub use handlers::{ShellError, activate, install};

/// Shared state of the shell server.
#[derive(Clone)]
pub struct ShellState {
    pub cache: Arc<ShellCache>,
    pub http: reqwest::Client,
    /// Frontend origin, without trailing slash.
    pub upstream: String,
}

impl ShellState {
    pub fn new(http: reqwest::Client, upstream: &str) -> Self {
        Self {
            cache: Arc::new(ShellCache::default()),
            http,
            upstream: upstream.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.upstream, path_and_query)
    }
}

/// Create the shell router. Every path is handled by the same caching proxy.
pub fn create_shell_router(state: ShellState) -> Router {
    Router::new()
        .fallback(handlers::shell_handler)
        .with_state(state)
}

/// Install and activate the shell, then serve until the listener fails.
pub async fn serve(listener: TcpListener, state: ShellState) -> std::io::Result<()> {
    match install(&state).await {
        Ok(stored) => info!(stored, version = CACHE_VERSION, "Shell installed"),
        // Still serve: uncached requests go to the network
        Err(e) => tracing::warn!(error = %e, "Shell install failed"),
    }
    let purged = activate(&state.cache);
    if !purged.is_empty() {
        info!(purged = ?purged, "Removed stale shell caches");
    }

    if let Ok(addr) = listener.local_addr() {
        info!("Shell listening on {} (upstream {})", addr, state.upstream);
    }
    axum::serve(listener, create_shell_router(state)).await
}
