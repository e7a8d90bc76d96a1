//! Validation error aggregate keyed by form field.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// Field name -> ordered messages, preserving server insertion order.
pub type FieldErrors = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorBagError {
    #[error("invalid error payload: expected an object with an `errors` map")]
    InvalidFormat,
}

/// Mutable collection of per-field validation messages.
///
/// A field whose message list has been emptied is treated as absent by the
/// queries. `all` and `all_for_field` clone on export so callers cannot
/// mutate internal state through the returned value.
#[derive(Debug, Clone, Default)]
pub struct ErrorBag {
    errors: FieldErrors,
}

impl ErrorBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole map from a server `{errors: {field: [msg, ..]}}`
    /// envelope.
    ///
    /// A payload without an `errors` object is a caller programming error,
    /// not a user-facing condition.
    pub fn record(&mut self, payload: &Value) -> Result<(), ErrorBagError> {
        let Some(errors) = payload.get("errors").and_then(Value::as_object) else {
            tracing::error!(payload = %payload, "invalid validation error payload");
            return Err(ErrorBagError::InvalidFormat);
        };

        self.errors = errors
            .iter()
            .map(|(field, messages)| (field.clone(), collect_messages(messages)))
            .collect();
        Ok(())
    }

    /// Replace the whole map from an already-decoded field-error map.
    pub fn replace(&mut self, errors: FieldErrors) {
        self.errors = errors;
    }

    /// Append one message to a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    /// Remove one message from a field by value equality.
    pub fn remove(&mut self, field: &str, message: &str) {
        if let Some(messages) = self.errors.get_mut(field) {
            messages.retain(|existing| existing != message);
        }
    }

    /// Empty one field's list without deleting the key.
    pub fn reset(&mut self, field: &str) {
        if let Some(messages) = self.errors.get_mut(field) {
            messages.clear();
        }
    }

    /// Drop every recorded error.
    pub fn clear(&mut self) {
        self.errors.clear();
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|messages| !messages.is_empty())
    }

    #[must_use]
    pub fn has_multiple(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|messages| messages.len() > 1)
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.errors.values().any(|messages| !messages.is_empty())
    }

    /// First message for a field, if any.
    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.errors
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// Every message for a field, cloned.
    #[must_use]
    pub fn all_for_field(&self, field: &str) -> Vec<String> {
        self.errors.get(field).cloned().unwrap_or_default()
    }

    /// The whole map, cloned.
    #[must_use]
    pub fn all(&self) -> FieldErrors {
        self.errors.clone()
    }
}

fn collect_messages(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(message) => vec![message.clone()],
        _ => Vec::new(),
    }
}
