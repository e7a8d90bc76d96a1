//! Wire shapes shared between the HTTP boundary and the core.
//!
//! List endpoints answer with either a bare JSON array or a page envelope
//! carrying pagination metadata. The shape is decided exactly once, at
//! decode time, into the tagged [`ListResult`]; nothing downstream
//! re-inspects the payload.

use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error_bag::FieldErrors;

/// The `{message, errors, data}` response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<FieldErrors>,
    #[serde(default)]
    pub data: Value,
}

impl ApiEnvelope {
    /// Interpret a decoded response body as an envelope.
    ///
    /// Non-object bodies (bare arrays, scalars) become an envelope with the
    /// whole body as `data` and no message or errors.
    #[must_use]
    pub fn from_value(body: Value) -> Self {
        if body.is_object() {
            match serde_json::from_value(body.clone()) {
                Ok(envelope) => return envelope,
                Err(_) => return Self { data: body, ..Self::default() },
            }
        }
        Self {
            data: body,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_field_errors(&self) -> bool {
        self.errors
            .as_ref()
            .is_some_and(|errors| !errors.is_empty())
    }
}

/// A completed, successful HTTP exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: StatusCode,
    pub payload: ApiEnvelope,
}

/// Failure taxonomy for the HTTP boundary.
///
/// The normalizer annotates and forwards these; it never swallows them.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Server answered with a structured `{errors: {..}}` map.
    #[error("validation failed ({status})")]
    Validation {
        status: StatusCode,
        message: Option<String>,
        errors: FieldErrors,
    },
    /// Server was reached and answered non-2xx without structured errors.
    #[error("request failed ({status})")]
    Request {
        status: StatusCode,
        message: Option<String>,
    },
    /// Server answered but the body did not decode as expected.
    #[error("response decode failed ({status}): {message}")]
    Decode { status: StatusCode, message: String },
    /// Server never answered: DNS failure, timeout, offline.
    #[error("network error: {message}")]
    Network { message: String },
    /// Client construction rejected its configuration.
    #[error("invalid client configuration: {message}")]
    Config { message: String },
}

impl ApiError {
    /// Status of the response, when one was received at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Validation { status, .. }
            | Self::Request { status, .. }
            | Self::Decode { status, .. } => Some(*status),
            Self::Network { .. } | Self::Config { .. } => None,
        }
    }
}

/// Pagination metadata as the server sends it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageEnvelope<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    #[serde(default)]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub to: Option<u64>,
}

/// Array-or-envelope union, decided once at the network boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListResult<T> {
    Page(PageEnvelope<T>),
    Items(Vec<T>),
}
