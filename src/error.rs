//! Error types shared by the refresh coordinator and the domain clients.

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Errors surfaced by authenticated calls.
///
/// `NoSession` and `SessionExpired` mean "log in again"; everything else is a
/// failure of the specific request and should be shown inline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No tokens stored when an authenticated call was attempted.
    #[error("No hay sesión activa")]
    NoSession,
    /// Token refresh failed; the local session has been cleared.
    #[error("Sesión expirada")]
    SessionExpired,
    /// Non-2xx response, carrying the backend message or a fallback.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    /// The request never produced a response.
    #[error("Error de red: {0}")]
    Transport(String),
    /// The request could not be built (bad header value, bad multipart part).
    #[error("Petición inválida: {0}")]
    InvalidRequest(String),
    /// A 2xx body that does not match the expected shape.
    #[error("Respuesta inválida: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// True when the caller should redirect to the login screen.
    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::NoSession | Self::SessionExpired)
    }

    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Convert a non-2xx response into an `ApiError::Http`.
/// Uses the body's `error` field, or `fallback` when the body is not that shape.
pub async fn error_from_response(response: Response, fallback: &str) -> ApiError {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            error: Some(message),
        }) if !message.is_empty() => message,
        Ok(_) => fallback.to_string(),
        Err(e) => {
            debug!(status = %status, error = %e, "Error body is not JSON");
            fallback.to_string()
        }
    };
    ApiError::Http { status, message }
}

/// Return the response if it is 2xx, otherwise the converted error.
pub async fn ensure_success(response: Response, fallback: &str) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response, fallback).await)
    }
}
