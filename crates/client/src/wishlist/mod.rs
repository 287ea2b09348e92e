//! Wishlist status coordinator.
//!
//! Answers "is product P in the shopper's wishlist?" from an in-memory cache
//! and fills that cache with as few network round-trips as possible:
//!
//! - [`WishlistCoordinator::is_in_wishlist`] never blocks and never fetches.
//! - [`WishlistCoordinator::check_status_batch`] queues unknown ids and
//!   (re)arms a trailing-edge debounce timer. When it fires, every pending id
//!   goes out in one `POST /wishlist/status/batch`.
//! - [`WishlistCoordinator::check_status`] waits on a per-id resolution signal
//!   for the batch that covers the id.
//! - Add/remove/clear update the cache once the backend confirms.
//!
//! All state is user-scoped. [`WishlistCoordinator::watch_session`] resets it
//! whenever the session signs in or out; results of requests issued before a
//! reset are discarded.
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = WishlistCoordinator::from_client(&client, config.wishlist);
//! coordinator.watch_session();
//!
//! // Product grid renders: queue every card, answer from cache later.
//! coordinator.check_status_batch(&card_ids);
//!
//! if coordinator.toggle_wishlist(product_id).await {
//!     println!("now wishlisted: {}", coordinator.is_in_wishlist(product_id));
//! }
//! ```

mod batch;
mod notice;
mod registry;

#[cfg(test)]
mod tests;

pub use batch::{BatchPhase, BatchState};
pub use notice::{Notice, NoticeBoard};
pub use registry::{ActiveRequests, RequestGuard, RequestKey};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use shopfront_core::{
    BatchStatusResponse, ClearWishlistResponse, ProductId, WishlistPage,
};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::session::Session;

/// Notice shown when a wishlist operation needs a signed-in user.
pub const LOGIN_REQUIRED_MESSAGE: &str = "Please log in to manage your wishlist";

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WishlistSettings {
    /// Quiet period after the last enqueue before a status batch is sent.
    pub debounce: Duration,
    /// How long an error notice stays visible.
    pub notice_ttl: Duration,
}

impl Default for WishlistSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            notice_ttl: DEFAULT_NOTICE_TTL,
        }
    }
}

/// Backend operations the coordinator depends on.
///
/// Implemented by [`ApiClient`]; tests substitute a recording fake.
#[async_trait]
pub trait WishlistApi: Send + Sync {
    /// `GET /wishlist?page&limit`.
    async fn fetch_wishlist(&self, page: u32, limit: u32) -> Result<WishlistPage, ApiError>;

    /// `GET /wishlist/count`.
    async fn fetch_wishlist_count(&self) -> Result<u32, ApiError>;

    /// `POST /wishlist/{id}`; returns the new count.
    async fn add_to_wishlist(&self, product_id: ProductId) -> Result<u32, ApiError>;

    /// `DELETE /wishlist/{id}`; returns the new count.
    async fn remove_from_wishlist(&self, product_id: ProductId) -> Result<u32, ApiError>;

    /// `POST /wishlist/status/batch`.
    async fn check_wishlist_status(
        &self,
        product_ids: &[ProductId],
    ) -> Result<BatchStatusResponse, ApiError>;

    /// `DELETE /wishlist`.
    async fn clear_wishlist(&self) -> Result<ClearWishlistResponse, ApiError>;
}

// =============================================================================
// WishlistCoordinator
// =============================================================================

/// Cache-backed wishlist status for the signed-in shopper.
///
/// Cheaply cloneable; clones share state. The debounce timer and the session
/// listener are cancelled when the last clone is dropped.
#[derive(Clone)]
pub struct WishlistCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    api: Arc<dyn WishlistApi>,
    session: Session,
    settings: WishlistSettings,
    requests: ActiveRequests,
    state: Mutex<CoordinatorState>,
}

#[derive(Default)]
struct CoordinatorState {
    /// Bumped on every reset; results from an older epoch are dropped.
    epoch: u64,
    cache: HashMap<ProductId, bool>,
    batch: BatchState,
    waiters: HashMap<ProductId, Vec<oneshot::Sender<bool>>>,
    timer: Option<JoinHandle<()>>,
    session_listener: Option<JoinHandle<()>>,
    count: Option<u32>,
    page: Option<WishlistPage>,
    /// Page size `page` was loaded with.
    page_limit: u32,
    notices: NoticeBoard,
}

impl CoordinatorState {
    /// Make `id`'s status known and wake anyone waiting on it.
    fn record(&mut self, id: ProductId, in_wishlist: bool) {
        self.cache.insert(id, in_wishlist);
        self.batch.forget(id);
        self.resolve(id, in_wishlist);
    }

    fn resolve(&mut self, id: ProductId, in_wishlist: bool) {
        if let Some(waiters) = self.waiters.remove(&id) {
            for waiter in waiters {
                // The waiter may have given up; nothing to do then.
                let _ = waiter.send(in_wishlist);
            }
        }
    }
}

impl WishlistCoordinator {
    /// Create a coordinator over `api`, scoped to `session`.
    ///
    /// Call [`Self::watch_session`] from within a tokio runtime to have the
    /// state reset automatically on sign-in/sign-out.
    #[must_use]
    pub fn new(api: Arc<dyn WishlistApi>, session: Session, settings: WishlistSettings) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                api,
                session,
                settings,
                requests: ActiveRequests::new(),
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    /// Create a coordinator backed by `client` and its session.
    #[must_use]
    pub fn from_client(client: &ApiClient, settings: WishlistSettings) -> Self {
        Self::new(
            Arc::new(client.clone()),
            client.session().clone(),
            settings,
        )
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.inner.lock()
    }

    // =========================================================================
    // Status lookups
    // =========================================================================

    /// Cached membership of `product_id`; unknown ids read as `false`.
    #[must_use]
    pub fn is_in_wishlist(&self, product_id: ProductId) -> bool {
        self.cached_status(product_id).unwrap_or(false)
    }

    /// Cached membership of `product_id`, `None` when unknown.
    #[must_use]
    pub fn cached_status(&self, product_id: ProductId) -> Option<bool> {
        self.lock().cache.get(&product_id).copied()
    }

    /// Queue every uncached id for the next status batch and restart the
    /// debounce window.
    ///
    /// Does nothing when signed out or when every id is already cached.
    /// Must be called from within a tokio runtime.
    pub fn check_status_batch(&self, product_ids: &[ProductId]) {
        if !self.inner.session.is_authenticated() {
            return;
        }
        let mut state = self.lock();
        self.enqueue(&mut state, product_ids);
    }

    /// Resolve the status of one product, batching with concurrent callers.
    ///
    /// Returns immediately on a cache hit. Otherwise waits for the batch that
    /// covers the id and returns its answer, or `false` if the batch failed,
    /// the id was missing from the response, or the session was reset.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn check_status(&self, product_id: ProductId) -> bool {
        let Some(receiver) = self.subscribe_status(product_id) else {
            return self.is_in_wishlist(product_id);
        };
        receiver.await.unwrap_or(false)
    }

    /// Resolve the status of several products with a single batch request.
    ///
    /// Results are returned in input order.
    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    pub async fn check_statuses(&self, product_ids: &[ProductId]) -> Vec<(ProductId, bool)> {
        let receivers: Vec<_> = product_ids
            .iter()
            .map(|&id| (id, self.subscribe_status(id)))
            .collect();

        let mut statuses = Vec::with_capacity(receivers.len());
        for (id, receiver) in receivers {
            let in_wishlist = match receiver {
                Some(receiver) => receiver.await.unwrap_or(false),
                None => self.is_in_wishlist(id),
            };
            statuses.push((id, in_wishlist));
        }
        statuses
    }

    /// Register a waiter for `product_id`, queueing it if nothing covers it yet.
    ///
    /// Returns `None` when the answer is already known (or cannot be fetched).
    fn subscribe_status(&self, product_id: ProductId) -> Option<oneshot::Receiver<bool>> {
        if !self.inner.session.is_authenticated() {
            return None;
        }

        let mut state = self.lock();
        if state.cache.contains_key(&product_id) {
            return None;
        }

        let (sender, receiver) = oneshot::channel();
        state.waiters.entry(product_id).or_default().push(sender);

        if !state.batch.is_pending(product_id) && !state.batch.is_in_flight(product_id) {
            self.enqueue(&mut state, &[product_id]);
        }
        Some(receiver)
    }

    fn enqueue(&self, state: &mut CoordinatorState, product_ids: &[ProductId]) {
        let uncached: Vec<ProductId> = product_ids
            .iter()
            .copied()
            .filter(|id| !state.cache.contains_key(id))
            .collect();

        if let Some(generation) = state.batch.enqueue(uncached) {
            self.arm_timer(state, generation);
        }
    }

    /// Cancel any armed timer and start a new one for `generation`.
    fn arm_timer(&self, state: &mut CoordinatorState, generation: u64) {
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }

        let weak = Arc::downgrade(&self.inner);
        let window = self.inner.settings.debounce;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(coordinator) = Self::upgrade(&weak) {
                coordinator.flush(generation).await;
            }
        }));
    }

    /// Drain the pending set (if `generation` is still current) and send it.
    async fn flush(&self, generation: u64) {
        let (ids, epoch) = {
            let mut state = self.lock();
            let Some(ids) = state.batch.fire(generation) else {
                return;
            };
            // This task now owns the drain; a later re-arm must not abort it.
            state.timer = None;
            (ids, state.epoch)
        };

        debug!(count = ids.len(), "Sending wishlist status batch");
        let result = self.inner.api.check_wishlist_status(&ids).await;

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("Discarding wishlist status batch from a previous session");
            return;
        }
        state.batch.settle(&ids);

        match result {
            Ok(response) => {
                for status in &response.statuses {
                    // An add/remove confirmed while the batch was in flight is newer.
                    state
                        .cache
                        .entry(status.product_id)
                        .or_insert(status.in_wishlist);
                }
                if let Some(count) = response.count {
                    state.count = Some(count);
                }
                for id in &ids {
                    let in_wishlist = state.cache.get(id).copied().unwrap_or(false);
                    state.resolve(*id, in_wishlist);
                }
            }
            Err(e) => {
                warn!(error = %e, ids = ?ids, "Wishlist status batch failed");
                for id in &ids {
                    state.resolve(*id, false);
                }
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add the product if it is not wishlisted, remove it otherwise.
    ///
    /// Returns whether the backend accepted the change.
    pub async fn toggle_wishlist(&self, product_id: ProductId) -> bool {
        if self.is_in_wishlist(product_id) {
            self.remove_from_wishlist(product_id).await
        } else {
            self.add_to_wishlist(product_id).await
        }
    }

    /// Add a product to the wishlist.
    ///
    /// Returns `false` (and posts a notice) if signed out or the request fails;
    /// the cache is only updated on success.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_wishlist(&self, product_id: ProductId) -> bool {
        let Some(epoch) = self.require_session() else {
            return false;
        };

        match self.inner.api.add_to_wishlist(product_id).await {
            Ok(count) => {
                let mut state = self.lock();
                if state.epoch == epoch {
                    state.record(product_id, true);
                    state.count = Some(count);
                }
                info!(count, "Added to wishlist");
                true
            }
            Err(e) => {
                self.report_write_failure(&e, "add to wishlist");
                false
            }
        }
    }

    /// Remove a product from the wishlist and from the loaded page.
    ///
    /// Returns `false` (and posts a notice) if signed out or the request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_wishlist(&self, product_id: ProductId) -> bool {
        let Some(epoch) = self.require_session() else {
            return false;
        };

        match self.inner.api.remove_from_wishlist(product_id).await {
            Ok(count) => {
                let mut state = self.lock();
                if state.epoch == epoch {
                    state.record(product_id, false);
                    state.count = Some(count);
                    let limit = state.page_limit;
                    if let Some(page) = state.page.as_mut() {
                        let before = page.items.len();
                        page.items.retain(|item| item.product_id() != product_id);
                        if page.items.len() < before {
                            page.pagination = shopfront_core::Pagination::for_total(
                                page.pagination.page,
                                limit,
                                page.pagination.total.saturating_sub(1),
                            );
                        }
                    }
                }
                info!(count, "Removed from wishlist");
                true
            }
            Err(e) => {
                self.report_write_failure(&e, "remove from wishlist");
                false
            }
        }
    }

    /// Remove every product from the wishlist.
    ///
    /// On success every cached status becomes `false` and the count drops to 0.
    #[instrument(skip(self))]
    pub async fn clear_wishlist(&self) -> bool {
        let Some(epoch) = self.require_session() else {
            return false;
        };

        match self.inner.api.clear_wishlist().await {
            Ok(response) => {
                let mut state = self.lock();
                if state.epoch == epoch {
                    let known: Vec<ProductId> = state.cache.keys().copied().collect();
                    for id in known {
                        state.record(id, false);
                    }
                    state.count = Some(response.count);
                    if let Some(page) = state.page.as_mut() {
                        page.items.clear();
                        page.pagination = shopfront_core::Pagination::for_total(1, 1, 0);
                    }
                }
                info!(deleted = response.deleted_count, "Cleared wishlist");
                true
            }
            Err(e) => {
                self.report_write_failure(&e, "clear wishlist");
                false
            }
        }
    }

    // =========================================================================
    // Listing and count
    // =========================================================================

    /// Load one page of the wishlist and keep it as the current page.
    ///
    /// Every listed product is recorded as wishlisted. Returns `None` when
    /// signed out, when the request fails, or when the same page is already
    /// being fetched (the duplicate call is dropped, not queued).
    #[instrument(skip(self))]
    pub async fn load_page(&self, page: u32, limit: u32) -> Option<WishlistPage> {
        let epoch = self.require_session()?;
        let Some(_guard) = self.inner.requests.try_acquire(RequestKey::WishlistPage(page)) else {
            debug!(key = %RequestKey::WishlistPage(page), "Request already in flight, dropping");
            return None;
        };

        match self.inner.api.fetch_wishlist(page, limit).await {
            Ok(loaded) => {
                let mut state = self.lock();
                if state.epoch != epoch {
                    return None;
                }
                for item in &loaded.items {
                    state.record(item.product_id(), true);
                }
                state.count = Some(loaded.pagination.total);
                state.page = Some(loaded.clone());
                state.page_limit = limit;
                Some(loaded)
            }
            Err(e) => {
                warn!(error = %e, page, "Failed to load wishlist page");
                None
            }
        }
    }

    /// Fetch the wishlist item count.
    ///
    /// Returns `None` when signed out, on failure, or when a count request is
    /// already in flight.
    #[instrument(skip(self))]
    pub async fn refresh_count(&self) -> Option<u32> {
        if !self.inner.session.is_authenticated() {
            return None;
        }
        let epoch = self.lock().epoch;
        let Some(_guard) = self.inner.requests.try_acquire(RequestKey::WishlistCount) else {
            debug!(key = %RequestKey::WishlistCount, "Request already in flight, dropping");
            return None;
        };

        match self.inner.api.fetch_wishlist_count().await {
            Ok(count) => {
                let mut state = self.lock();
                if state.epoch != epoch {
                    return None;
                }
                state.count = Some(count);
                Some(count)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch wishlist count");
                None
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Last known wishlist item count.
    #[must_use]
    pub fn wishlist_count(&self) -> Option<u32> {
        self.lock().count
    }

    /// The most recently loaded wishlist page.
    #[must_use]
    pub fn loaded_page(&self) -> Option<WishlistPage> {
        self.lock().page.clone()
    }

    /// Ids waiting for the next status batch, ascending.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<ProductId> {
        self.lock().batch.pending_ids()
    }

    /// Current phase of the status batch machine.
    #[must_use]
    pub fn batch_phase(&self) -> BatchPhase {
        self.lock().batch.phase()
    }

    /// Number of products with a known status.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.lock().cache.len()
    }

    /// The registry of in-flight page/count requests.
    #[must_use]
    pub fn active_requests(&self) -> &ActiveRequests {
        &self.inner.requests
    }

    /// The message currently shown to the shopper, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        self.lock().notices.current().map(|n| n.message.clone())
    }

    /// Hide the current notice.
    pub fn dismiss_notice(&self) {
        self.lock().notices.dismiss();
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Forget all user-scoped state.
    ///
    /// Clears the cache, pending and in-flight sets, request registry, loaded
    /// page and count, and cancels the debounce timer. Waiters resolve to
    /// `false`. In-flight responses arriving afterwards are ignored. The
    /// current notice is kept so "session expired" style messages survive.
    pub fn reset(&self) {
        {
            let mut state = self.lock();
            state.epoch += 1;
            state.cache.clear();
            state.batch.reset();
            // Dropping the senders wakes every waiter with `false`.
            state.waiters.clear();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.count = None;
            state.page = None;
            state.page_limit = 0;
        }
        self.inner.requests.clear();
        debug!("Wishlist state reset");
    }

    /// Reset whenever the session signs in or out.
    ///
    /// Replaces any previous listener. Must be called from within a tokio runtime.
    pub fn watch_session(&self) {
        let mut events = self.inner.session.subscribe();
        let weak = Arc::downgrade(&self.inner);

        let listener = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => Some(event),
                    // Missed events still mean the user changed at least once.
                    Err(broadcast::error::RecvError::Lagged(_)) => None,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(coordinator) = Self::upgrade(&weak) else {
                    break;
                };
                debug!(?event, "Session changed");
                coordinator.reset();
            }
        });

        if let Some(previous) = self.lock().session_listener.replace(listener) {
            previous.abort();
        }
    }

    /// Stop background work: cancel the debounce timer and the session listener.
    ///
    /// Ids still pending are discarded without a request; their waiters
    /// resolve to `false`. Batches already sent are not cancelled.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if let Some(listener) = state.session_listener.take() {
            listener.abort();
        }
        for id in state.batch.cancel_pending() {
            state.waiters.remove(&id);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn upgrade(weak: &Weak<CoordinatorInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Current epoch if signed in; otherwise posts the login notice.
    fn require_session(&self) -> Option<u64> {
        if self.inner.session.is_authenticated() {
            return Some(self.lock().epoch);
        }
        self.post_notice(LOGIN_REQUIRED_MESSAGE);
        None
    }

    fn report_write_failure(&self, error: &ApiError, action: &str) {
        warn!(error = %error, "Failed to {action}");
        let message = if error.is_auth_error() {
            LOGIN_REQUIRED_MESSAGE.to_string()
        } else {
            error.user_message()
        };
        self.post_notice(message);
    }

    /// Show `message` and schedule it to disappear after the notice TTL.
    fn post_notice(&self, message: impl Into<String>) {
        let id = self.lock().notices.post(message);
        let weak = Arc::downgrade(&self.inner);
        let ttl = self.inner.settings.notice_ttl;

        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(coordinator) = Self::upgrade(&weak) {
                coordinator.lock().notices.expire(id);
            }
        });
    }
}

impl CoordinatorInner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if let Some(listener) = state.session_listener.take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for WishlistCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("WishlistCoordinator")
            .field("settings", &self.inner.settings)
            .field("cached", &state.cache.len())
            .field("phase", &state.batch.phase())
            .field("count", &state.count)
            .finish_non_exhaustive()
    }
}
