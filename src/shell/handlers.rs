use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use super::ShellState;
use super::cache::{CachedResponse, SHELL_URLS, ShellCache, strip_hop_by_hop};

/// Largest request body forwarded upstream.
const MAX_FORWARD_BODY: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("upstream answered {status} for {url}")]
    Status { url: String, status: StatusCode },
}

/// Fetch every shell URL into the current generation.
///
/// Fails on the first URL that cannot be fetched or answers non-2xx; URLs
/// stored before the failure stay cached.
pub async fn install(state: &ShellState) -> Result<usize, ShellError> {
    for path in SHELL_URLS {
        let url = state.upstream_url(path);
        let fresh = fetch(state, &url).await?;
        if !fresh.status.is_success() {
            return Err(ShellError::Status {
                url,
                status: fresh.status,
            });
        }
        state.cache.put(path, fresh);
        debug!(path = %path, "Precached");
    }
    Ok(SHELL_URLS.len())
}

/// Drop every cache generation other than the current one.
pub fn activate(cache: &ShellCache) -> Vec<String> {
    cache.purge_stale()
}

pub(super) async fn shell_handler(State(state): State<ShellState>, request: Request) -> Response {
    if request.method() == Method::GET {
        let key = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        serve_get(state, key).await
    } else {
        forward(state, request).await
    }
}

async fn serve_get(state: ShellState, key: String) -> Response {
    if let Some(cached) = state.cache.get(&key) {
        // Serve the stale copy now, refresh it for next time
        tokio::spawn(revalidate(state.clone(), key));
        return cached.into_response();
    }

    let url = state.upstream_url(&key);
    match fetch(&state, &url).await {
        Ok(fresh) => {
            if fresh.status.is_success() {
                state.cache.put(&key, fresh.clone());
            }
            fresh.into_response()
        }
        Err(e) => {
            warn!(path = %key, error = %e, "Upstream unreachable");
            match state.cache.get("/") {
                Some(shell) => shell.into_response(),
                None => (StatusCode::SERVICE_UNAVAILABLE, "Sin conexión").into_response(),
            }
        }
    }
}

async fn revalidate(state: ShellState, key: String) {
    let url = state.upstream_url(&key);
    match fetch(&state, &url).await {
        Ok(fresh) if fresh.status.is_success() => {
            state.cache.put(&key, fresh);
            debug!(path = %key, "Revalidated");
        }
        Ok(fresh) => debug!(path = %key, status = %fresh.status, "Kept cached copy"),
        Err(e) => debug!(path = %key, error = %e, "Revalidation failed"),
    }
}

async fn forward(state: ShellState, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = state.upstream_url(path);

    let body = match to_bytes(body, MAX_FORWARD_BODY).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    info!(method = %parts.method, path = %path, "Forwarding");
    let upstream = state
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match upstream {
        Ok(response) => match into_cached(response).await {
            Ok(response) => response.into_response(),
            Err(e) => {
                warn!(url = %url, error = %e, "Upstream body failed");
                StatusCode::BAD_GATEWAY.into_response()
            }
        },
        Err(e) => {
            warn!(url = %url, error = %e, "Forwarding failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn fetch(state: &ShellState, url: &str) -> Result<CachedResponse, ShellError> {
    let response = state.http.get(url).send().await?;
    into_cached(response).await
}

async fn into_cached(response: reqwest::Response) -> Result<CachedResponse, ShellError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok(CachedResponse::new(status, headers, body))
}
