//! Versioned response cache.
//!
//! Responses are grouped into named generations. Only the current
//! generation is read or written; activation drops every other one.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Generation tag of the current shell.
pub const CACHE_VERSION: &str = "app-cache-v1";
/// URLs stored at install time so the app opens offline.
pub const SHELL_URLS: [&str; 2] = ["/", "/manifest.webmanifest"];

/// A stored response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> Self {
        strip_hop_by_hop(&mut headers);
        Self {
            status,
            headers,
            body,
        }
    }
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Remove headers that describe one connection rather than the resource.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::CONTENT_LENGTH,
        header::UPGRADE,
        header::TE,
        header::TRAILER,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

type Generation = HashMap<String, CachedResponse>;

#[derive(Debug)]
pub struct ShellCache {
    current: String,
    generations: RwLock<HashMap<String, Generation>>,
}

impl Default for ShellCache {
    fn default() -> Self {
        Self::new(CACHE_VERSION)
    }
}

impl ShellCache {
    pub fn new(current: impl Into<String>) -> Self {
        let current = current.into();
        let mut generations = HashMap::new();
        generations.insert(current.clone(), Generation::new());
        Self {
            current,
            generations: RwLock::new(generations),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Ensure a generation exists (used when an older shell left one behind).
    pub fn open(&self, name: &str) {
        self.write().entry(name.to_string()).or_default();
    }

    /// Names of every generation, sorted.
    pub fn generations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.get_in(&self.current, key)
    }

    pub fn get_in(&self, generation: &str, key: &str) -> Option<CachedResponse> {
        self.generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(generation)?
            .get(key)
            .cloned()
    }

    pub fn put(&self, key: &str, response: CachedResponse) {
        self.put_in(&self.current, key, response);
    }

    pub fn put_in(&self, generation: &str, key: &str, response: CachedResponse) {
        self.write()
            .entry(generation.to_string())
            .or_default()
            .insert(key.to_string(), response);
    }

    pub fn len(&self) -> usize {
        self.generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.current)
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every generation other than the current one. Returns the dropped names.
    pub fn purge_stale(&self) -> Vec<String> {
        let mut generations = self.write();
        let mut stale: Vec<String> = generations
            .keys()
            .filter(|name| **name != self.current)
            .cloned()
            .collect();
        stale.sort();
        for name in &stale {
            generations.remove(name);
        }
        stale
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Generation>> {
        self.generations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
