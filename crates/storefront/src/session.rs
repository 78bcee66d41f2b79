//! Current-identity gate consulted by every authenticated operation.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use dawa_core::UserId;
use secrecy::SecretString;

use crate::config::Credentials;

/// A signed-in user and their session token.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub token: SecretString,
}

impl Identity {
    #[must_use]
    pub fn new(user_id: UserId, token: impl Into<String>) -> Self {
        Self {
            user_id,
            token: SecretString::from(token.into()),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl From<Credentials> for Identity {
    fn from(credentials: Credentials) -> Self {
        Self {
            user_id: credentials.user_id,
            token: credentials.token,
        }
    }
}

/// Supplies the current identity, if anyone is signed in.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<Identity>;
}

/// In-memory session holder.
///
/// Cheap to clone; clones observe the same sign-in state.
#[derive(Clone, Default)]
pub struct SessionGate {
    current: Arc<RwLock<Option<Identity>>>,
}

impl SessionGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session, replacing any previous one.
    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(user_id = %identity.user_id, "Signed in");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    /// End the session, returning the identity that was signed in.
    pub fn sign_out(&self) -> Option<Identity> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(identity) = &previous {
            tracing::info!(user_id = %identity.user_id, "Signed out");
        }
        previous
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl IdentityProvider for SessionGate {
    fn current_user(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGate")
            .field("current", &self.current_user())
            .finish()
    }
}
