//! Registry of in-flight requests, keyed by logical operation.
//!
//! At most one request per [`RequestKey`] runs at a time. A caller that finds
//! its key taken gets nothing back and must not issue the request.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Composite name of a logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// `GET /wishlist?page={n}`.
    WishlistPage(u32),
    /// `GET /wishlist/count`.
    WishlistCount,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WishlistPage(page) => write!(f, "wishlist-page-{page}"),
            Self::WishlistCount => write!(f, "wishlist-count"),
        }
    }
}

/// Shared set of active request keys.
#[derive(Debug, Clone, Default)]
pub struct ActiveRequests {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    /// Key to the ticket of the guard holding it.
    active: HashMap<RequestKey, u64>,
    next_ticket: u64,
}

impl ActiveRequests {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` if a request with the same key is already running.
    #[must_use]
    pub fn try_acquire(&self, key: RequestKey) -> Option<RequestGuard> {
        let mut registry = self.lock();
        if registry.active.contains_key(&key) {
            return None;
        }
        registry.next_ticket += 1;
        let ticket = registry.next_ticket;
        registry.active.insert(key, ticket);

        Some(RequestGuard {
            registry: Arc::clone(&self.inner),
            key,
            ticket,
        })
    }

    /// Whether `key` is currently claimed.
    #[must_use]
    pub fn contains(&self, key: RequestKey) -> bool {
        self.lock().active.contains_key(&key)
    }

    /// Number of claimed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    /// Whether no key is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().active.is_empty()
    }

    /// Release every key. Guards issued before the clear become inert.
    pub fn clear(&self) {
        self.lock().active.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Claim on a [`RequestKey`]; releases the key when dropped.
#[derive(Debug)]
pub struct RequestGuard {
    registry: Arc<Mutex<Registry>>,
    key: RequestKey,
    ticket: u64,
}

impl RequestGuard {
    /// The claimed key.
    #[must_use]
    pub const fn key(&self) -> RequestKey {
        self.key
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // After a clear the key may belong to a newer request.
        if registry.active.get(&self.key) == Some(&self.ticket) {
            registry.active.remove(&self.key);
        }
    }
}
