use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    routing::{get, post},
};
use las_aves::shell::{
    CACHE_VERSION, CachedResponse, SHELL_URLS, ShellState, activate, create_shell_router, install,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Frontend origin that counts hits and versions its bundle.
async fn start_upstream() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new()
        .route("/", get(|| async { "<html>Las Aves</html>" }))
        .route("/manifest.webmanifest", get(|| async { r#"{"name":"Las Aves"}"# }))
        .route(
            "/app.js",
            get(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { format!("bundle v{}", n) }
            }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/echo", post(|body: Bytes| async move { body }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hits)
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn offline_state() -> ShellState {
    // Nothing listens on the discard port
    ShellState::new(reqwest::Client::new(), "http://127.0.0.1:9")
}

fn cached(body: &'static str) -> CachedResponse {
    CachedResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
}

#[tokio::test]
async fn test_install_and_activate() {
    let (upstream, _) = start_upstream().await;
    let state = ShellState::new(reqwest::Client::new(), &upstream);
    state.cache.put_in("app-cache-v0", "/", cached("old shell"));

    let stored = install(&state).await.unwrap();
    assert_eq!(stored, SHELL_URLS.len());
    assert!(state.cache.get("/manifest.webmanifest").is_some());

    let purged = activate(&state.cache);
    assert_eq!(purged, vec!["app-cache-v0".to_string()]);
    assert_eq!(state.cache.generations(), vec![CACHE_VERSION.to_string()]);
}

#[tokio::test]
async fn test_install_fails_when_upstream_is_down() {
    let state = offline_state();
    assert!(install(&state).await.is_err());
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn test_cached_copy_is_served_offline() {
    let state = offline_state();
    state.cache.put("/", cached("<html>shell</html>"));
    let app = create_shell_router(state);

    let response = app.clone().oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<html>shell</html>");

    // Uncached navigations fall back to the shell document
    let response = app.oneshot(get_request("/finanzas")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<html>shell</html>");
}

#[tokio::test]
async fn test_offline_without_cache_is_unavailable() {
    let app = create_shell_router(offline_state());

    let response = app.oneshot(get_request("/app.js")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(response).await, "Sin conexión");
}

#[tokio::test]
async fn test_stale_while_revalidate() {
    let (upstream, hits) = start_upstream().await;
    let state = ShellState::new(reqwest::Client::new(), &upstream);
    let app = create_shell_router(state.clone());

    let response = app.clone().oneshot(get_request("/app.js")).await.unwrap();
    assert_eq!(body_text(response).await, "bundle v1");

    // Served from cache immediately, refreshed in the background
    let response = app.oneshot(get_request("/app.js")).await.unwrap();
    assert_eq!(body_text(response).await, "bundle v1");

    let mut refreshed = false;
    for _ in 0..100 {
        if let Some(entry) = state.cache.get("/app.js") {
            if entry.body == Bytes::from_static(b"bundle v2") {
                refreshed = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(refreshed);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let (upstream, _) = start_upstream().await;
    let state = ShellState::new(reqwest::Client::new(), &upstream);
    let app = create_shell_router(state.clone());

    let response = app.oneshot(get_request("/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(state.cache.get("/missing").is_none());
}

#[tokio::test]
async fn test_non_get_is_forwarded() {
    let (upstream, _) = start_upstream().await;
    let state = ShellState::new(reqwest::Client::new(), &upstream);
    let app = create_shell_router(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"monto": 150}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"monto": 150}"#);
    assert!(state.cache.get("/echo").is_none());
}

#[tokio::test]
async fn test_non_get_offline_is_bad_gateway() {
    let app = create_shell_router(offline_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/gastos/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
