//! Response and error normalization.
//!
//! Every completed exchange funnels through here: the error bag is cleared
//! at the start of each cycle, failures are recorded and surfaced as
//! exactly one toast, and the failure itself is always handed back to the
//! caller. The toast and bag updates are observability, not control flow.

use std::sync::Arc;

use crate::envelope::{ApiError, Exchange};
use crate::error_bag::ErrorBag;
use crate::toast::{DEFAULT_TOAST_DURATION_MS, Severity, Toaster};

/// Fixed message for failures where the server was never reached.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// Synthetic field used to record network-level failures in the bag.
pub const NETWORK_FIELD: &str = "network";

pub struct ResponseHandler {
    errors: ErrorBag,
    toaster: Arc<Toaster>,
}

impl ResponseHandler {
    pub fn new(toaster: Arc<Toaster>) -> Self {
        Self {
            errors: ErrorBag::new(),
            toaster,
        }
    }

    /// Handle a successful exchange.
    ///
    /// Clears the bag, then toasts only when the payload carries a message
    /// or the classified severity is success. Silent 2xx responses without
    /// a message stay silent so routine fetches produce no noise.
    pub fn handle_success(&mut self, exchange: &Exchange) {
        self.errors.clear();
        let severity = Severity::classify(exchange.status);
        if exchange.payload.message.is_some() || severity == Severity::Success {
            self.toaster
                .show_exchange(exchange, severity, DEFAULT_TOAST_DURATION_MS);
        }
    }

    /// Handle a failed exchange and hand the failure back for propagation.
    ///
    /// Exactly one toast per failure: field errors get the aggregated
    /// field-error toast, reachable-server failures get one generic toast,
    /// and network-level failures get the fixed network message plus a
    /// synthetic `network` entry in the bag.
    #[must_use = "the failure must be propagated to the caller"]
    pub fn handle_failure(&mut self, error: ApiError) -> ApiError {
        self.errors.clear();
        match &error {
            ApiError::Validation {
                status,
                message,
                errors,
            } => {
                self.errors.replace(errors.clone());
                self.toaster.show_field_errors(
                    errors,
                    Some(*status),
                    message.as_deref(),
                    DEFAULT_TOAST_DURATION_MS,
                );
            }
            ApiError::Request { status, message } => {
                let text = message.clone().unwrap_or_else(|| {
                    format!("Error {}: Request failed", status.as_u16())
                });
                self.toaster.show_message(
                    &text,
                    Severity::classify(*status),
                    DEFAULT_TOAST_DURATION_MS,
                );
            }
            ApiError::Decode { status, .. } => {
                let text = format!("Error {}: Request failed", status.as_u16());
                self.toaster.show_message(
                    &text,
                    Severity::classify(*status),
                    DEFAULT_TOAST_DURATION_MS,
                );
            }
            ApiError::Network { .. } | ApiError::Config { .. } => {
                self.errors.add(NETWORK_FIELD, NETWORK_ERROR_MESSAGE);
                self.toaster.show_message(
                    NETWORK_ERROR_MESSAGE,
                    Severity::ServerError,
                    DEFAULT_TOAST_DURATION_MS,
                );
            }
        }
        error
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorBag {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorBag {
        &mut self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ApiEnvelope;
    use crate::toast::{MemorySink, Toast, ToastSink};
    use http::StatusCode;
    use indexmap::indexmap;

    fn handler() -> (ResponseHandler, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let toaster = Arc::new(Toaster::new(Arc::clone(&sink) as Arc<dyn ToastSink>));
        (ResponseHandler::new(toaster), sink)
    }

    fn exchange(status: StatusCode, message: Option<&str>) -> Exchange {
        Exchange {
            status,
            payload: ApiEnvelope {
                message: message.map(str::to_string),
                ..ApiEnvelope::default()
            },
        }
    }

    #[test]
    fn success_with_message_toasts_once() {
        let (mut handler, sink) = handler();
        handler.handle_success(&exchange(StatusCode::CREATED, Some("User created")));

        let toasts = sink.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].description, "User created");
        assert_eq!(toasts[0].severity, Severity::Success);
    }

    #[test]
    fn silent_redirect_produces_no_toast() {
        let (mut handler, sink) = handler();
        handler.handle_success(&exchange(StatusCode::FOUND, None));
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn validation_failure_records_and_toasts_field_errors() {
        let (mut handler, sink) = handler();
        let errors = indexmap! { "email".to_string() => vec!["taken".to_string()] };

        let forwarded = handler.handle_failure(ApiError::Validation {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: Some("The given data was invalid.".to_string()),
            errors: errors.clone(),
        });

        assert!(matches!(forwarded, ApiError::Validation { .. }));
        assert_eq!(handler.errors().first("email"), Some("taken"));

        let toasts = sink.drain();
        assert_eq!(toasts.len(), 1, "exactly one toast per failure");
        assert_eq!(toasts[0].title, "The given data was invalid.");
        assert_eq!(toasts[0].description, "Email: taken");
    }

    #[test]
    fn request_failure_synthesizes_a_generic_message() {
        let (mut handler, sink) = handler();
        let _ = handler.handle_failure(ApiError::Request {
            status: StatusCode::NOT_FOUND,
            message: None,
        });

        let toasts = sink.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].description, "Error 404: Request failed");
        assert_eq!(toasts[0].severity, Severity::ClientError);
    }

    #[test]
    fn network_failure_uses_the_fixed_message() {
        let (mut handler, sink) = handler();
        let _ = handler.handle_failure(ApiError::Network {
            message: "connection refused".to_string(),
        });

        assert_eq!(
            handler.errors().first(NETWORK_FIELD),
            Some(NETWORK_ERROR_MESSAGE)
        );
        let toasts = sink.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].description, NETWORK_ERROR_MESSAGE);
        assert_eq!(toasts[0].severity, Severity::ServerError);
    }

    #[test]
    fn each_cycle_starts_from_a_clean_bag() {
        let (mut handler, sink) = handler();
        let errors = indexmap! { "email".to_string() => vec!["taken".to_string()] };
        let _ = handler.handle_failure(ApiError::Validation {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: None,
            errors,
        });
        assert!(handler.errors().any());

        handler.handle_success(&exchange(StatusCode::OK, None));
        assert!(!handler.errors().any());
        let _toasts: Vec<Toast> = sink.drain();
    }
}
