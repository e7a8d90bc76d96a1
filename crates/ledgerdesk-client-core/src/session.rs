//! Session state: current user, bearer token, permission set.
//!
//! The live store is the source of truth; the encrypted cookie entry is a
//! write-through cache of a whitelisted projection, read back once at
//! startup. A corrupted snapshot self-heals to logged-out through the
//! jar's corrupted-cookie policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cipher::Cipher;
use crate::cookies::{CookieJar, CookieOptions};
use crate::envelope::ApiError;

/// Fixed name of the persisted, encrypted session entry.
pub const SESSION_COOKIE: &str = "auth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Whitelisted projection persisted across reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Server-confirmed identity, as answered by the `me` probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub user: User,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Transport used to re-validate a restored token against the server.
#[async_trait]
pub trait AuthTransport {
    async fn fetch_identity(&self, token: &str) -> Result<Identity, ApiError>;
}

/// Per-route authorization flags, read from the routing table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteRule {
    pub requires_auth: bool,
    /// Auth screens: only reachable while logged out.
    pub guest_only: bool,
}

/// What the navigation guard should do with an attempted navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavDecision {
    Proceed,
    RedirectToLogin { return_to: String },
    RedirectHome,
}

pub struct SessionStore {
    user: Option<User>,
    token: Option<String>,
    permissions: Vec<String>,
    cipher: Cipher,
    jar: CookieJar,
}

impl SessionStore {
    #[must_use]
    pub fn new(cipher: Cipher, jar: CookieJar) -> Self {
        Self {
            user: None,
            token: None,
            permissions: Vec::new(),
            cipher,
            jar,
        }
    }

    /// Read the persisted snapshot back into the live store.
    ///
    /// A missing or corrupted snapshot leaves the store logged out; the
    /// corrupted entry is deleted by the jar.
    pub fn restore(&mut self) {
        let Some(snapshot) = self
            .jar
            .get_encrypted::<SessionSnapshot>(&self.cipher, SESSION_COOKIE)
        else {
            return;
        };
        self.user = snapshot.user;
        self.token = snapshot.token;
        self.permissions = snapshot.permissions;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|held| held == permission)
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn user_full_name(&self) -> String {
        self.user
            .as_ref()
            .map(|user| user.name.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
        self.persist();
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
        self.persist();
    }

    pub fn set_permissions(&mut self, permissions: Vec<String>) {
        self.permissions = permissions;
        self.persist();
    }

    /// Clear every field and drop the persisted snapshot.
    pub fn logout(&mut self) {
        self.user = None;
        self.token = None;
        self.permissions.clear();
        self.jar.remove(SESSION_COOKIE);
    }

    /// Re-validate the (restored) token against the server.
    ///
    /// Any failure tears the session down: an invalid token must not keep
    /// the console in a half-authenticated state.
    pub async fn check_auth<T: AuthTransport + Sync>(&mut self, transport: &T) -> bool {
        let Some(token) = self.token.clone() else {
            return false;
        };
        match transport.fetch_identity(&token).await {
            Ok(identity) => {
                self.user = Some(identity.user);
                self.permissions = identity.permissions;
                self.persist();
                true
            }
            Err(error) => {
                tracing::warn!(error = %error, "auth check failed, clearing session");
                self.logout();
                false
            }
        }
    }

    /// Authorization predicate for the navigation guard.
    #[must_use]
    pub fn route_decision(&self, rule: RouteRule, path: &str) -> NavDecision {
        if rule.requires_auth && !self.is_authenticated() {
            NavDecision::RedirectToLogin {
                return_to: path.to_string(),
            }
        } else if rule.guest_only && self.is_authenticated() {
            NavDecision::RedirectHome
        } else {
            NavDecision::Proceed
        }
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }

    fn persist(&mut self) {
        let snapshot = SessionSnapshot {
            user: self.user.clone(),
            token: self.token.clone(),
            permissions: self.permissions.clone(),
        };
        if let Err(error) = self.jar.set_encrypted_json(
            &self.cipher,
            SESSION_COOKIE,
            &snapshot,
            CookieOptions::default(),
        ) {
            tracing::warn!(error = %error, "failed to persist session snapshot");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("user", &self.user)
            .field("authenticated", &self.is_authenticated())
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}
