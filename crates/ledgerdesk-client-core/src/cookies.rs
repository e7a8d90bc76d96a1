//! Persistent key-value store with cookie semantics.
//!
//! The jar models the browser cookie jar the console session lives in:
//! string values with per-entry scope and expiry options, JSON decoding on
//! read with a raw-string fallback, and encrypted variants that route
//! through the [`Cipher`](crate::cipher::Cipher). Callers cannot tell
//! "stored a bare string" apart from "stored malformed JSON" and must
//! tolerate either.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::cipher::{Cipher, CipherError};

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("value serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Cross-site policy for a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Scope and lifetime options for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub expires: Option<DateTime<Utc>>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: SameSite,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            expires: None,
            path: "/".to_string(),
            domain: None,
            secure: true,
            same_site: SameSite::Strict,
            http_only: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    options: CookieOptions,
}

impl Entry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.options.expires.is_some_and(|expires| expires <= now)
    }
}

/// In-memory cookie jar.
#[derive(Debug, Default)]
pub struct CookieJar {
    entries: BTreeMap<String, Entry>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw string value.
    pub fn set(&mut self, name: &str, value: &str, options: CookieOptions) {
        self.entries.insert(
            name.to_string(),
            Entry {
                value: value.to_string(),
                options,
            },
        );
    }

    /// Store any serializable value as JSON text.
    pub fn set_json<T: Serialize>(
        &mut self,
        name: &str,
        value: &T,
        options: CookieOptions,
    ) -> Result<(), CookieError> {
        let text = serde_json::to_string(value)?;
        self.set(name, &text, options);
        Ok(())
    }

    /// Store an encrypted raw string value.
    pub fn set_encrypted(
        &mut self,
        cipher: &Cipher,
        name: &str,
        value: &str,
        options: CookieOptions,
    ) -> Result<(), CookieError> {
        let envelope = cipher.encrypt(value)?;
        self.set(name, &envelope, options);
        Ok(())
    }

    /// Store an encrypted, JSON-serialized value.
    pub fn set_encrypted_json<T: Serialize>(
        &mut self,
        cipher: &Cipher,
        name: &str,
        value: &T,
        options: CookieOptions,
    ) -> Result<(), CookieError> {
        let text = serde_json::to_string(value)?;
        self.set_encrypted(cipher, name, &text, options)
    }

    /// Raw stored text, expiry-aware.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        let entry = self.entries.get(name)?;
        if entry.expired(Utc::now()) {
            return None;
        }
        Some(&entry.value)
    }

    /// Decode a stored value.
    ///
    /// Tries JSON first and falls back to treating the raw text as a bare
    /// string, so `get::<String>` returns malformed JSON verbatim.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.get_raw(name).and_then(decode_stored)
    }

    /// Decrypt and decode a stored value.
    ///
    /// A value that fails decryption is corrupted as far as the session is
    /// concerned: log it, delete it, and report absence. The next write
    /// repopulates the entry, so the jar heals itself.
    pub fn get_encrypted<T: DeserializeOwned>(
        &mut self,
        cipher: &Cipher,
        name: &str,
    ) -> Option<T> {
        let envelope = self.get_raw(name)?.to_string();
        match cipher.decrypt(&envelope) {
            Ok(plaintext) => decode_stored(&plaintext),
            Err(error) => {
                tracing::warn!(name = %name, error = %error, "removing cookie that failed decryption");
                self.remove(name);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get_raw(name).is_some()
    }

    /// Every live (unexpired) entry's raw text.
    #[must_use]
    pub fn get_all(&self) -> BTreeMap<String, String> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.expired(now))
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect()
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }
}

fn decode_stored<T: DeserializeOwned>(text: &str) -> Option<T> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(_) => serde_json::from_value(Value::String(text.to_string())).ok(),
    }
}
