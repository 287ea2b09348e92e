//! Authentication state shared by the API client and the wishlist coordinator.
//!
//! The session owns the token store and broadcasts [`SessionEvent`]s whenever
//! the signed-in user changes. Consumers holding user-scoped state (the
//! wishlist cache) subscribe and reset themselves on every event.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::SecretString;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::token::{TokenStore, TokenStoreError};

/// Capacity of the session event channel. Subscribers only care about the
/// latest transitions, so a small buffer is enough.
const EVENT_CAPACITY: usize = 16;

/// Change of authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user signed in (possibly replacing another user).
    LoggedIn,
    /// The user signed out or the backend rejected the token.
    LoggedOut,
}

/// Shared authentication state.
///
/// Cheaply cloneable; all clones observe the same token.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Box<dyn TokenStore>,
    token: RwLock<Option<SecretString>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Create a session, restoring any token already in `store`.
    ///
    /// A store that cannot be read is treated as signed out.
    pub fn new(store: impl TokenStore + 'static) -> Self {
        let token = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored token, starting signed out");
            None
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(SessionInner {
                store: Box::new(store),
                token: RwLock::new(token),
                events,
            }),
        }
    }

    /// Whether a bearer token is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current bearer token.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store a new token and announce the sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted. The in-memory
    /// session is left unchanged in that case.
    pub fn sign_in(&self, token: SecretString) -> Result<(), TokenStoreError> {
        self.inner.store.save(&token)?;
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
        info!("Signed in");
        self.broadcast(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Drop the token and announce the sign-out.
    ///
    /// Returns `false` if the session was already signed out, in which case
    /// no event is sent.
    pub fn sign_out(&self) -> bool {
        let previous = self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to remove stored token");
        }

        if previous.is_none() {
            return false;
        }
        info!("Signed out");
        self.broadcast(SessionEvent::LoggedOut);
        true
    }

    /// Subscribe to authentication changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    fn broadcast(&self, event: SessionEvent) {
        // No subscribers is fine: nothing user-scoped is cached yet.
        let _ = self.inner.events.send(event);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
