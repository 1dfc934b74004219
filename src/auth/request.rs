//! Replayable request descriptions for authenticated calls.
//!
//! The coordinator may send a request twice (once more after a 401), so the
//! body is kept as plain data and turned into a `reqwest` body per attempt.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Serialized JSON. Sent with `Content-Type: application/json`.
    Json(Vec<u8>),
    /// Multipart form. `reqwest` sets the content type with its boundary.
    Multipart(Vec<FormField>),
}

#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl ToString) -> Self {
        Self::Text {
            name: name.into(),
            value: value.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn delete() -> Self {
        Self::with_method(Method::DELETE)
    }

    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn post_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        Self::with_method(Method::POST).json(value)
    }

    pub fn put_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        Self::with_method(Method::PUT).json(value)
    }

    pub fn post_multipart(fields: Vec<FormField>) -> Self {
        Self {
            method: Method::POST,
            body: Some(RequestBody::Multipart(fields)),
            ..Self::default()
        }
    }

    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, ApiError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = Some(RequestBody::Json(bytes));
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Build a fresh multipart form for one attempt.
pub(crate) fn build_form(fields: &[FormField]) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name.clone(), value.clone()),
            FormField::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}
