//! Session token and cached profile storage.
//!
//! Getters never fail: an unavailable or unreadable backend reads as "no
//! value", which the refresh coordinator treats as "no session".

use std::sync::Arc;
use tracing::warn;

use super::{KeyValueStorage, MemoryStorage};
use crate::auth::{SessionTokens, Usuario};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

#[derive(Clone)]
pub struct TokenStore {
    backend: Option<Arc<dyn KeyValueStorage>>,
}

impl TokenStore {
    pub fn new(backend: impl KeyValueStorage + 'static) -> Self {
        Self {
            backend: Some(Arc::new(backend)),
        }
    }

    pub fn from_shared(backend: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// A store for environments without persistent storage.
    /// Reads return nothing and writes are dropped.
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Persist both tokens in one write.
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) {
        let Some(backend) = &self.backend else { return };
        if let Err(e) = backend.set_many(&[
            (ACCESS_TOKEN_KEY, access_token),
            (REFRESH_TOKEN_KEY, refresh_token),
        ]) {
            warn!(error = %e, "Failed to persist session tokens");
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Both tokens, or `None` if either is missing.
    pub fn tokens(&self) -> Option<SessionTokens> {
        Some(SessionTokens {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
        })
    }

    pub fn clear_tokens(&self) {
        self.remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]);
    }

    pub fn set_user(&self, user: &Usuario) {
        let Some(backend) = &self.backend else { return };
        let json = match serde_json::to_string(user) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize user profile");
                return;
            }
        };
        if let Err(e) = backend.set(USER_KEY, &json) {
            warn!(error = %e, "Failed to persist user profile");
        }
    }

    /// The cached profile. A corrupt entry reads as no user.
    pub fn user(&self) -> Option<Usuario> {
        let raw = self.read(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Ignoring corrupt cached user profile");
                None
            }
        }
    }

    pub fn clear_user(&self) {
        self.remove(&[USER_KEY]);
    }

    /// Remove tokens and profile together.
    pub fn clear_all(&self) {
        self.remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY]);
    }

    fn read(&self, key: &str) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = %key, error = %e, "Storage read failed");
                None
            }
        }
    }

    fn remove(&self, keys: &[&str]) {
        let Some(backend) = &self.backend else { return };
        if let Err(e) = backend.remove_many(keys) {
            warn!(error = %e, "Failed to clear stored session");
        }
    }
}
