//! Authenticated fetch with single-flight token refresh.
//!
//! Every authenticated API call goes through [`AuthService::authenticated_fetch`].
//! Two things can trigger a refresh: the stored access token expiring within
//! the threshold, or the backend answering 401 to a token that looked valid.
//! Both feed the same in-flight handle, so at most one `/auth/refresh` call is
//! outstanding at any time and every waiter sees the same outcome.
//!
//! A failed refresh is terminal: the token store is cleared and callers get
//! [`ApiError::SessionExpired`]; later calls fail fast with
//! [`ApiError::NoSession`].

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::Backend;
use super::request::{RequestBody, RequestOptions, build_form};
use super::types::{LoginCredentials, LoginResponse, RefreshResponse, SessionTokens};
use crate::error::ApiError;
use crate::jwt::{self, TOKEN_REFRESH_THRESHOLD_SECS};
use crate::storage::TokenStore;

type RefreshHandle = Shared<BoxFuture<'static, Result<SessionTokens, ApiError>>>;

struct InFlight {
    generation: u64,
    handle: RefreshHandle,
}

type InFlightSlot = Mutex<Option<InFlight>>;

/// Tuning for the refresh coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Renew when the access token expires within this many seconds.
    pub refresh_threshold_secs: u64,
    /// Give up on a refresh after this long. A timeout ends the session.
    pub refresh_timeout: Option<Duration>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: TOKEN_REFRESH_THRESHOLD_SECS,
            refresh_timeout: None,
        }
    }
}

/// The auth service: login/refresh/logout plus the authenticated fetch wrapper.
///
/// Cheap to clone; clones share the token store and the in-flight refresh.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Backend,
    tokens: TokenStore,
    options: CoordinatorOptions,
    in_flight: Arc<InFlightSlot>,
    next_generation: AtomicU64,
}

impl AuthService {
    pub fn new(base_url: &str, tokens: TokenStore) -> Self {
        Self::with_options(Client::new(), base_url, tokens, CoordinatorOptions::default())
    }

    pub fn with_options(
        http: Client,
        base_url: &str,
        tokens: TokenStore,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend: Backend::new(http, base_url),
                tokens,
                options,
                in_flight: Arc::new(Mutex::new(None)),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, ApiError> {
        self.inner.backend.login(credentials).await
    }

    /// Raw refresh call. Does not touch the token store or the in-flight handle.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        self.inner.backend.refresh(refresh_token).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        self.inner.backend.logout(refresh_token).await
    }

    /// Whether a refresh is currently outstanding.
    pub fn refresh_in_flight(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Send an authenticated request to `endpoint` (a path such as `/api/gastos`).
    ///
    /// Non-2xx responses other than the handled 401 are returned as-is; the
    /// domain clients turn them into errors.
    pub async fn authenticated_fetch(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, ApiError> {
        let Some(seen) = self.inner.tokens.tokens() else {
            debug!(endpoint = %endpoint, "No active session");
            return Err(ApiError::NoSession);
        };

        let mut access_token = seen.access_token.clone();
        let mut refreshed = false;
        if jwt::is_expiring_soon(&access_token, self.inner.options.refresh_threshold_secs) {
            debug!(endpoint = %endpoint, "Access token expiring, renewing before request");
            access_token = self.renew(seen).await?.access_token;
            refreshed = true;
        }

        let response = self.send(endpoint, &options, &access_token).await?;
        if response.status() != StatusCode::UNAUTHORIZED || refreshed {
            return Ok(response);
        }

        // Rejected despite a token that looked valid (revoked, clock skew, ...)
        info!(endpoint = %endpoint, "Backend rejected access token, retrying once");
        let Some(current) = self.inner.tokens.tokens() else {
            // Another call's refresh failed meanwhile and ended the session
            return Err(ApiError::SessionExpired);
        };
        let retry_token = if current.access_token != access_token {
            // Another call already renewed the pair
            current.access_token
        } else {
            self.renew(current).await?.access_token
        };

        self.send(endpoint, &options, &retry_token).await
    }

    /// Join the in-flight refresh, or start one for the pair `seen`.
    async fn renew(&self, seen: SessionTokens) -> Result<SessionTokens, ApiError> {
        self.claim_refresh(seen).await
    }

    fn claim_refresh(&self, seen: SessionTokens) -> RefreshHandle {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(in_flight) = slot.as_ref() {
            debug!(generation = in_flight.generation, "Joining in-flight token refresh");
            return in_flight.handle.clone();
        }

        // A refresh may have finished since `seen` was read. Its outcome is
        // already in the store, and the rotated-out refresh token must not
        // be sent again.
        match self.inner.tokens.tokens() {
            None => {
                debug!("Session ended by an earlier refresh");
                return future::ready(Err(ApiError::SessionExpired)).boxed().shared();
            }
            Some(current) if current != seen => {
                debug!("Token pair already renewed, skipping refresh");
                return future::ready(Ok(current)).boxed().shared();
            }
            Some(_) => {}
        }
        let refresh_token = seen.refresh_token;

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let task = RefreshTask {
            backend: self.inner.backend.clone(),
            tokens: self.inner.tokens.clone(),
            timeout: self.inner.options.refresh_timeout,
            slot: Arc::downgrade(&self.inner.in_flight),
            generation,
        };
        let handle = task.run(refresh_token).boxed().shared();
        *slot = Some(InFlight {
            generation,
            handle: handle.clone(),
        });
        handle
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        access_token: &str,
    ) -> Result<Response, ApiError> {
        let mut headers = options.headers.clone();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|_| ApiError::InvalidRequest("access token is not a valid header".into()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let url = self.inner.backend.url(endpoint);
        let mut request = self.inner.backend.http().request(options.method.clone(), &url);
        match &options.body {
            Some(RequestBody::Json(bytes)) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                request = request.headers(headers).body(bytes.clone());
            }
            Some(RequestBody::Multipart(fields)) => {
                // reqwest writes the multipart content type with its boundary
                headers.remove(CONTENT_TYPE);
                request = request.headers(headers).multipart(build_form(fields)?);
            }
            None => {
                request = request.headers(headers);
            }
        }

        let response = request.send().await?;
        debug!(method = %options.method, endpoint = %endpoint, status = %response.status(), "Request completed");
        Ok(response)
    }
}

/// One refresh attempt, shared by every caller that joins it.
struct RefreshTask {
    backend: Backend,
    tokens: TokenStore,
    timeout: Option<Duration>,
    slot: Weak<InFlightSlot>,
    generation: u64,
}

impl RefreshTask {
    async fn run(self, refresh_token: String) -> Result<SessionTokens, ApiError> {
        info!(generation = self.generation, "Refreshing access token");

        let outcome = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.backend.refresh(&refresh_token)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ApiError::Transport(format!(
                        "token refresh timed out after {:?}",
                        limit
                    ))),
                }
            }
            None => self.backend.refresh(&refresh_token).await,
        };

        let result = match outcome {
            Ok(renewed) => {
                self.tokens
                    .set_tokens(&renewed.access_token, &renewed.refresh_token);
                Ok(SessionTokens::from(renewed))
            }
            Err(e) => {
                warn!(generation = self.generation, error = %e, "Token refresh failed, ending session");
                self.tokens.clear_all();
                Err(ApiError::SessionExpired)
            }
        };

        // Storage is settled before the handle is released, so the next
        // caller reads either the new pair or an empty store.
        self.release();
        result
    }

    fn release(&self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().map(|f| f.generation) == Some(self.generation) {
            *slot = None;
        }
    }
}
