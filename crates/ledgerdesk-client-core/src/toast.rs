//! Transient user-facing notifications.
//!
//! A [`Toaster`] allocates monotonically increasing ids from its own counter
//! and hands finished [`Toast`] records to a [`ToastSink`]. The sink is the
//! presentation boundary; [`MemorySink`] is the in-process implementation
//! used by the console shell and by tests. No module-level globals: every
//! toaster owns its counter, so parallel tests never collide on ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use http::StatusCode;

use crate::envelope::Exchange;
use crate::error_bag::FieldErrors;

/// Default display duration, matching the console's toast widget.
pub const DEFAULT_TOAST_DURATION_MS: u64 = 2_000;

/// Severity tier derived from an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    ClientError,
    ServerError,
    Info,
}

impl Severity {
    /// 2xx -> success, 4xx -> client error, 5xx -> server error, anything
    /// else (redirects and other oddities) -> info.
    #[must_use]
    pub fn classify(status: StatusCode) -> Self {
        match status.as_u16() {
            200..=299 => Self::Success,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Info,
        }
    }

    fn title(self, status: Option<StatusCode>) -> String {
        match (self, status) {
            (Self::Success, _) => "Success".to_string(),
            (Self::ClientError, Some(status)) => format!("Client Error - {}", status.as_u16()),
            (Self::ClientError, None) => "Error Occurred".to_string(),
            (Self::ServerError, Some(status)) => format!("Server Error - {}", status.as_u16()),
            (Self::ServerError, None) => "Server Error".to_string(),
            (Self::Info, Some(status)) => format!("Info ({})", status.as_u16()),
            (Self::Info, None) => "Information".to_string(),
        }
    }
}

/// One notification record. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub errors: Option<FieldErrors>,
    pub duration_ms: u64,
}

/// Presentation boundary for finished toast records.
pub trait ToastSink: Send + Sync {
    fn push(&self, toast: Toast);

    /// Dismiss everything currently shown. Default is a no-op for sinks
    /// that have nothing to dismiss.
    fn dismiss_all(&self) {}
}

/// Sink that collects toasts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    toasts: Mutex<Vec<Toast>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything pushed so far.
    #[must_use]
    pub fn records(&self) -> Vec<Toast> {
        self.lock().clone()
    }

    /// Take everything pushed so far, leaving the sink empty.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Toast>> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ToastSink for MemorySink {
    fn push(&self, toast: Toast) {
        self.lock().push(toast);
    }

    fn dismiss_all(&self) {
        self.lock().clear();
    }
}

/// Builds and emits toast records.
pub struct Toaster {
    next_id: AtomicU64,
    sink: Arc<dyn ToastSink>,
}

impl Toaster {
    pub fn new(sink: Arc<dyn ToastSink>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sink,
        }
    }

    /// Emit a plain message toast.
    pub fn show_message(&self, message: &str, severity: Severity, duration_ms: u64) {
        self.emit(Toast {
            id: 0,
            title: severity.title(None),
            description: message.to_string(),
            severity,
            errors: None,
            duration_ms,
        });
    }

    /// Emit a toast for a completed exchange, taking the description from
    /// the server message when one is present.
    pub fn show_exchange(&self, exchange: &Exchange, severity: Severity, duration_ms: u64) {
        let description = exchange.payload.message.clone().unwrap_or_else(|| {
            if severity == Severity::Success {
                "Operation completed successfully".to_string()
            } else {
                "An error occurred".to_string()
            }
        });
        self.emit(Toast {
            id: 0,
            title: severity.title(Some(exchange.status)),
            description,
            severity,
            errors: exchange.payload.errors.clone(),
            duration_ms,
        });
    }

    /// Emit a single toast covering every field's messages.
    ///
    /// Title precedence: server message, then the HTTP status line text,
    /// then the generic client-error title.
    pub fn show_field_errors(
        &self,
        errors: &FieldErrors,
        status: Option<StatusCode>,
        message: Option<&str>,
        duration_ms: u64,
    ) {
        let title = message
            .map(str::to_string)
            .or_else(|| {
                status
                    .and_then(|s| s.canonical_reason())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| Severity::ClientError.title(status));

        let formatted = format_field_errors(errors);
        let description = if formatted.is_empty() {
            message.map_or_else(|| "An error occurred".to_string(), str::to_string)
        } else {
            formatted
        };

        self.emit(Toast {
            id: 0,
            title,
            description,
            severity: Severity::ClientError,
            errors: Some(errors.clone()),
            duration_ms,
        });
    }

    /// Dismiss everything the sink is currently showing.
    pub fn dismiss_all(&self) {
        self.sink.dismiss_all();
    }

    fn emit(&self, mut toast: Toast) {
        toast.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sink.push(toast);
    }
}

impl std::fmt::Debug for Toaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toaster")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

/// Format a field-error map as one line per field:
/// `"First Name: required\nEmail: invalid, taken"`.
#[must_use]
pub fn format_field_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, messages)| format!("{}: {}", title_case_field(field), messages.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `snake_case` field name -> `Title Case` display name.
fn title_case_field(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
