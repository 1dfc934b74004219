//! Unauthenticated calls to the `/auth` endpoints.

use reqwest::Client;
use tracing::debug;

use super::types::{LoginCredentials, LoginResponse, RefreshResponse, RefreshTokenBody};
use crate::error::{ApiError, ensure_success};

/// HTTP client bound to the backend base URL.
#[derive(Clone, Debug)]
pub struct Backend {
    http: Client,
    base_url: String,
}

impl Backend {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint path such as `/api/gastos?limite=10`.
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Exchange credentials for tokens and the user profile.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, ApiError> {
        debug!(email = %credentials.email, "POST /auth/login");
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await?;
        let response = ensure_success(response, "Error al iniciar sesión").await?;
        Ok(response.json().await?)
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        debug!("POST /auth/refresh");
        let response = self
            .http
            .post(self.url("/auth/refresh"))
            .json(&RefreshTokenBody { refresh_token })
            .send()
            .await?;
        let response = ensure_success(response, "Error al renovar token").await?;
        Ok(response.json().await?)
    }

    /// Revoke a refresh token server-side.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        debug!("POST /auth/logout");
        let response = self
            .http
            .post(self.url("/auth/logout"))
            .json(&RefreshTokenBody { refresh_token })
            .send()
            .await?;
        ensure_success(response, "Error al cerrar sesión").await?;
        Ok(())
    }
}
