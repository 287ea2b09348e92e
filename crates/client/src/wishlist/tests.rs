#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shopfront_core::{
    BatchStatusResponse, ClearWishlistResponse, CurrencyCode, Pagination, Price, Product,
    ProductId, ProductStatus, WishlistItem, WishlistPage,
};

use super::*;
use crate::token::MemoryTokenStore;

// =============================================================================
// Fake backend
// =============================================================================

#[derive(Default)]
struct FakeApi {
    wishlist: Mutex<BTreeSet<ProductId>>,
    /// Ids the batch endpoint leaves out of its response.
    omitted: Mutex<HashSet<ProductId>>,
    batch_calls: Mutex<Vec<Vec<ProductId>>>,
    page_calls: AtomicUsize,
    count_calls: AtomicUsize,
    write_calls: AtomicUsize,
    fail_batches: AtomicBool,
    fail_writes: AtomicBool,
    reject_token: AtomicBool,
    /// Latency of read endpoints (batch, page, count).
    delay: Mutex<Duration>,
}

impl FakeApi {
    fn with_wishlist(ids: &[i64]) -> Arc<Self> {
        let api = Self::default();
        api.wishlist
            .lock()
            .unwrap()
            .extend(ids.iter().copied().map(ProductId::new));
        Arc::new(api)
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    fn batch_calls(&self) -> Vec<Vec<ProductId>> {
        self.batch_calls.lock().unwrap().clone()
    }

    fn len(&self) -> u32 {
        u32::try_from(self.wishlist.lock().unwrap().len()).unwrap()
    }

    async fn latency(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn write_error(&self) -> Option<ApiError> {
        if self.reject_token.load(Ordering::SeqCst) {
            return Some(ApiError::Unauthorized);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Some(ApiError::Api {
                status: 500,
                message: "Wishlist service unavailable".to_string(),
            });
        }
        None
    }
}

fn product(id: ProductId) -> Product {
    Product {
        id,
        name: format!("Product {id}"),
        description: None,
        price: Price::new(Decimal::new(1999, 2), CurrencyCode::USD),
        image_url: None,
        in_stock: true,
        variants: Vec::new(),
    }
}

#[async_trait]
impl WishlistApi for FakeApi {
    async fn fetch_wishlist(&self, page: u32, limit: u32) -> Result<WishlistPage, ApiError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.latency().await;

        let ids: Vec<ProductId> = self.wishlist.lock().unwrap().iter().copied().collect();
        let skip = usize::try_from(page.saturating_sub(1) * limit).unwrap();
        let items = ids
            .iter()
            .skip(skip)
            .take(usize::try_from(limit).unwrap())
            .map(|&id| WishlistItem {
                product: product(id),
                added_at: Utc::now(),
                variant_id: None,
            })
            .collect();

        Ok(WishlistPage {
            items,
            pagination: Pagination::for_total(page, limit, self.len()),
        })
    }

    async fn fetch_wishlist_count(&self) -> Result<u32, ApiError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.latency().await;
        Ok(self.len())
    }

    async fn add_to_wishlist(&self, product_id: ProductId) -> Result<u32, ApiError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.write_error() {
            return Err(e);
        }
        self.wishlist.lock().unwrap().insert(product_id);
        Ok(self.len())
    }

    async fn remove_from_wishlist(&self, product_id: ProductId) -> Result<u32, ApiError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.write_error() {
            return Err(e);
        }
        self.wishlist.lock().unwrap().remove(&product_id);
        Ok(self.len())
    }

    async fn check_wishlist_status(
        &self,
        product_ids: &[ProductId],
    ) -> Result<BatchStatusResponse, ApiError> {
        self.batch_calls.lock().unwrap().push(product_ids.to_vec());

        // Answer reflects the backend at the moment the request arrives.
        let response = {
            let wishlist = self.wishlist.lock().unwrap();
            let omitted = self.omitted.lock().unwrap();
            BatchStatusResponse {
                statuses: product_ids
                    .iter()
                    .filter(|id| !omitted.contains(id))
                    .map(|&product_id| ProductStatus {
                        product_id,
                        in_wishlist: wishlist.contains(&product_id),
                    })
                    .collect(),
                count: Some(u32::try_from(wishlist.len()).unwrap()),
            }
        };

        self.latency().await;
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(ApiError::Api {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        Ok(response)
    }

    async fn clear_wishlist(&self) -> Result<ClearWishlistResponse, ApiError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.write_error() {
            return Err(e);
        }
        let mut wishlist = self.wishlist.lock().unwrap();
        let deleted_count = u32::try_from(wishlist.len()).unwrap();
        wishlist.clear();
        Ok(ClearWishlistResponse {
            deleted_count,
            count: 0,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn p(id: i64) -> ProductId {
    ProductId::new(id)
}

fn ids(raw: &[i64]) -> Vec<ProductId> {
    raw.iter().copied().map(ProductId::new).collect()
}

fn coordinator(api: &Arc<FakeApi>) -> (WishlistCoordinator, Session) {
    let session = Session::new(MemoryTokenStore::with_token("test-token"));
    let coordinator = WishlistCoordinator::new(
        Arc::clone(api) as Arc<dyn WishlistApi>,
        session.clone(),
        WishlistSettings::default(),
    );
    (coordinator, session)
}

fn signed_out(api: &Arc<FakeApi>) -> WishlistCoordinator {
    WishlistCoordinator::new(
        Arc::clone(api) as Arc<dyn WishlistApi>,
        Session::new(MemoryTokenStore::new()),
        WishlistSettings::default(),
    )
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// Status lookups and batching
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unknown_status_reads_false_without_fetching() {
    let api = FakeApi::with_wishlist(&[1]);
    let (coordinator, _session) = coordinator(&api);

    assert!(!coordinator.is_in_wishlist(p(1)));
    assert_eq!(coordinator.cached_status(p(1)), None);

    advance(500).await;
    assert!(api.batch_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_calls_within_window_coalesce_into_one_request() {
    let api = FakeApi::with_wishlist(&[2]);
    let (coordinator, _session) = coordinator(&api);

    coordinator.check_status_batch(&ids(&[3, 1]));
    advance(60).await;
    coordinator.check_status_batch(&ids(&[2, 3]));
    assert_eq!(coordinator.batch_phase(), BatchPhase::Accumulating);
    assert_eq!(coordinator.pending_ids(), ids(&[1, 2, 3]));

    // Window restarted at t=60, so nothing is sent at t=100.
    advance(60).await;
    assert!(api.batch_calls().is_empty());

    advance(100).await;
    assert_eq!(api.batch_calls(), vec![ids(&[1, 2, 3])]);
    assert_eq!(coordinator.cached_status(p(1)), Some(false));
    assert_eq!(coordinator.cached_status(p(2)), Some(true));
    assert_eq!(coordinator.cached_status(p(3)), Some(false));
    assert_eq!(coordinator.batch_phase(), BatchPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cached_ids_are_never_requested_again() {
    let api = FakeApi::with_wishlist(&[1]);
    let (coordinator, _session) = coordinator(&api);

    assert!(coordinator.check_status(p(1)).await);
    coordinator.check_status_batch(&ids(&[1]));
    assert_eq!(coordinator.batch_phase(), BatchPhase::Idle);

    advance(500).await;
    assert_eq!(api.batch_calls(), vec![ids(&[1])]);
    assert!(coordinator.is_in_wishlist(p(1)));
}

#[tokio::test(start_paused = true)]
async fn test_fully_cached_call_does_not_extend_window() {
    let api = FakeApi::with_wishlist(&[]);
    let (coordinator, _session) = coordinator(&api);

    assert!(!coordinator.check_status(p(9)).await);

    coordinator.check_status_batch(&ids(&[1]));
    advance(60).await;
    coordinator.check_status_batch(&ids(&[9]));

    // Fires 100ms after the first call, not after the second.
    advance(45).await;
    assert_eq!(api.batch_calls(), vec![ids(&[9]), ids(&[1])]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_check_status_share_one_batch() {
    let api = FakeApi::with_wishlist(&[2]);
    let (coordinator, _session) = coordinator(&api);

    let (first, second, third) = tokio::join!(
        coordinator.check_status(p(1)),
        coordinator.check_status(p(2)),
        coordinator.check_status(p(2)),
    );

    assert!(!first);
    assert!(second);
    assert!(third);
    assert_eq!(api.batch_calls(), vec![ids(&[1, 2])]);
}

#[tokio::test(start_paused = true)]
async fn test_check_statuses_preserves_input_order() {
    let api = FakeApi::with_wishlist(&[5]);
    let (coordinator, _session) = coordinator(&api);

    let statuses = coordinator.check_statuses(&ids(&[7, 5, 6])).await;
    assert_eq!(statuses, vec![(p(7), false), (p(5), true), (p(6), false)]);
    assert_eq!(api.batch_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ids_enqueued_while_in_flight_go_to_next_batch() {
    let api = FakeApi::with_wishlist(&[2]);
    api.set_delay(Duration::from_secs(1));
    let (coordinator, _session) = coordinator(&api);

    coordinator.check_status_batch(&ids(&[1]));
    advance(150).await;
    assert_eq!(coordinator.batch_phase(), BatchPhase::Draining);

    coordinator.check_status_batch(&ids(&[2]));
    assert_eq!(coordinator.batch_phase(), BatchPhase::Accumulating);
    assert_eq!(coordinator.pending_ids(), ids(&[2]));

    advance(2000).await;
    assert_eq!(api.batch_calls(), vec![ids(&[1]), ids(&[2])]);
    assert_eq!(coordinator.batch_phase(), BatchPhase::Idle);
    assert!(coordinator.is_in_wishlist(p(2)));
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_id_is_not_requested_twice() {
    let api = FakeApi::with_wishlist(&[1]);
    api.set_delay(Duration::from_secs(1));
    let (coordinator, _session) = coordinator(&api);

    coordinator.check_status_batch(&ids(&[1]));
    advance(150).await;
    coordinator.check_status_batch(&ids(&[1]));
    assert_eq!(coordinator.batch_phase(), BatchPhase::Draining);

    // A waiter attached mid-flight gets the in-flight answer.
    assert!(coordinator.check_status(p(1)).await);
    assert_eq!(api.batch_calls(), vec![ids(&[1])]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_leaves_ids_uncached() {
    let api = FakeApi::with_wishlist(&[1]);
    api.fail_batches.store(true, Ordering::SeqCst);
    let (coordinator, _session) = coordinator(&api);

    assert!(!coordinator.check_status(p(1)).await);
    assert_eq!(coordinator.cached_status(p(1)), None);
    assert_eq!(coordinator.batch_phase(), BatchPhase::Idle);
    // Status checks fail quietly.
    assert_eq!(coordinator.notice(), None);

    // A later check retries.
    api.fail_batches.store(false, Ordering::SeqCst);
    assert!(coordinator.check_status(p(1)).await);
    assert_eq!(api.batch_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ids_missing_from_response_stay_uncached() {
    let api = FakeApi::with_wishlist(&[1, 2]);
    api.omitted.lock().unwrap().insert(p(2));
    let (coordinator, _session) = coordinator(&api);

    let statuses = coordinator.check_statuses(&ids(&[1, 2])).await;
    assert_eq!(statuses, vec![(p(1), true), (p(2), false)]);
    assert_eq!(coordinator.cached_status(p(2)), None);
}

#[tokio::test(start_paused = true)]
async fn test_batch_response_updates_count() {
    let api = FakeApi::with_wishlist(&[1, 2, 3]);
    let (coordinator, _session) = coordinator(&api);

    coordinator.check_status(p(4)).await;
    assert_eq!(coordinator.wishlist_count(), Some(3));
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_toggle_adds_then_removes() {
    let api = FakeApi::with_wishlist(&[]);
    let (coordinator, _session) = coordinator(&api);

    assert!(coordinator.toggle_wishlist(p(1)).await);
    assert!(coordinator.is_in_wishlist(p(1)));
    assert_eq!(coordinator.wishlist_count(), Some(1));

    assert!(coordinator.toggle_wishlist(p(1)).await);
    assert_eq!(coordinator.cached_status(p(1)), Some(false));
    assert_eq!(coordinator.wishlist_count(), Some(0));
    assert!(api.wishlist.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_add_removes_id_from_pending_batch() {
    let api = FakeApi::with_wishlist(&[]);
    let (coordinator, _session) = coordinator(&api);

    coordinator.check_status_batch(&ids(&[1, 2]));
    assert!(coordinator.add_to_wishlist(p(1)).await);
    assert_eq!(coordinator.pending_ids(), ids(&[2]));

    advance(200).await;
    assert_eq!(api.batch_calls(), vec![ids(&[2])]);
}

#[tokio::test(start_paused = true)]
async fn test_write_confirmed_mid_flight_wins_over_batch_answer() {
    let api = FakeApi::with_wishlist(&[]);
    api.set_delay(Duration::from_secs(1));
    let (coordinator, _session) = coordinator(&api);

    coordinator.check_status_batch(&ids(&[1]));
    advance(150).await;
    assert!(coordinator.add_to_wishlist(p(1)).await);

    // The batch was answered before the add and says "not wishlisted".
    advance(2000).await;
    assert_eq!(coordinator.cached_status(p(1)), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_keeps_cache_and_posts_notice() {
    let api = FakeApi::with_wishlist(&[]);
    api.fail_writes.store(true, Ordering::SeqCst);
    let (coordinator, _session) = coordinator(&api);

    assert!(!coordinator.add_to_wishlist(p(1)).await);
    assert_eq!(coordinator.cached_status(p(1)), None);
    assert_eq!(
        coordinator.notice().as_deref(),
        Some("Wishlist service unavailable")
    );
}

#[tokio::test(start_paused = true)]
async fn test_notice_clears_itself_after_ttl() {
    let api = FakeApi::with_wishlist(&[]);
    api.fail_writes.store(true, Ordering::SeqCst);
    let (coordinator, _session) = coordinator(&api);

    coordinator.add_to_wishlist(p(1)).await;
    advance(4_000).await;
    assert!(coordinator.notice().is_some());

    advance(1_500).await;
    assert_eq!(coordinator.notice(), None);
}

#[tokio::test(start_paused = true)]
async fn test_newer_notice_outlives_older_timer() {
    let api = FakeApi::with_wishlist(&[]);
    api.fail_writes.store(true, Ordering::SeqCst);
    let (coordinator, _session) = coordinator(&api);

    coordinator.add_to_wishlist(p(1)).await;
    advance(3_000).await;
    coordinator.remove_from_wishlist(p(1)).await;

    // First notice's timer fires at t=5s and must not clear the second.
    advance(2_500).await;
    assert!(coordinator.notice().is_some());

    advance(3_000).await;
    assert_eq!(coordinator.notice(), None);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_asks_to_log_in() {
    let api = FakeApi::with_wishlist(&[]);
    api.reject_token.store(true, Ordering::SeqCst);
    let (coordinator, _session) = coordinator(&api);

    assert!(!coordinator.add_to_wishlist(p(1)).await);
    assert_eq!(coordinator.notice().as_deref(), Some(LOGIN_REQUIRED_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_clear_marks_every_cached_product_absent() {
    let api = FakeApi::with_wishlist(&[1, 2]);
    let (coordinator, _session) = coordinator(&api);

    coordinator.load_page(1, 20).await.unwrap();
    assert!(coordinator.is_in_wishlist(p(1)));

    assert!(coordinator.clear_wishlist().await);
    assert_eq!(coordinator.cached_status(p(1)), Some(false));
    assert_eq!(coordinator.cached_status(p(2)), Some(false));
    assert_eq!(coordinator.wishlist_count(), Some(0));
    assert!(coordinator.loaded_page().unwrap().items.is_empty());
}

// =============================================================================
// Listing and count
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_load_page_marks_items_wishlisted() {
    let api = FakeApi::with_wishlist(&[1, 2, 3]);
    let (coordinator, _session) = coordinator(&api);

    let page = coordinator.load_page(1, 2).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.pagination.has_next);

    assert!(coordinator.is_in_wishlist(p(1)));
    assert!(coordinator.is_in_wishlist(p(2)));
    assert_eq!(coordinator.cached_status(p(3)), None);
    assert_eq!(coordinator.wishlist_count(), Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_page_load_is_dropped() {
    let api = FakeApi::with_wishlist(&[1]);
    api.set_delay(Duration::from_millis(300));
    let (coordinator, _session) = coordinator(&api);

    let (first, second) = tokio::join!(coordinator.load_page(1, 20), coordinator.load_page(1, 20));
    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(api.page_calls.load(Ordering::SeqCst), 1);
    assert!(coordinator.active_requests().is_empty());

    // Distinct pages are independent.
    let (first, second) = tokio::join!(coordinator.load_page(1, 20), coordinator.load_page(2, 20));
    assert!(first.is_some());
    assert!(second.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_count_refresh_is_dropped() {
    let api = FakeApi::with_wishlist(&[1, 2]);
    api.set_delay(Duration::from_millis(300));
    let (coordinator, _session) = coordinator(&api);

    let (first, second) = tokio::join!(coordinator.refresh_count(), coordinator.refresh_count());
    assert_eq!(first, Some(2));
    assert_eq!(second, None);
    assert_eq!(api.count_calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.wishlist_count(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_remove_evicts_item_from_loaded_page() {
    let api = FakeApi::with_wishlist(&[1, 2]);
    let (coordinator, _session) = coordinator(&api);

    coordinator.load_page(1, 20).await.unwrap();
    assert!(coordinator.remove_from_wishlist(p(1)).await);

    let page = coordinator.loaded_page().unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].product_id(), p(2));
    assert_eq!(page.pagination.total, 1);
    assert_eq!(coordinator.wishlist_count(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_remove_recomputes_page_metadata() {
    let api = FakeApi::with_wishlist(&[1, 2, 3]);
    let (coordinator, _session) = coordinator(&api);

    let page = coordinator.load_page(1, 2).await.unwrap();
    assert_eq!(page.pagination.total_pages, 2);
    assert!(page.pagination.has_next);

    assert!(coordinator.remove_from_wishlist(p(1)).await);

    let page = coordinator.loaded_page().unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.pagination.page, 1);
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.pagination.total_pages, 1);
    assert!(!page.pagination.has_next);
    assert!(!page.pagination.has_prev);
}

// =============================================================================
// Session scoping
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_signed_out_writes_ask_to_log_in() {
    let api = FakeApi::with_wishlist(&[]);
    let coordinator = signed_out(&api);

    assert!(!coordinator.toggle_wishlist(p(1)).await);
    assert!(coordinator.load_page(1, 20).await.is_none());
    assert_eq!(coordinator.notice().as_deref(), Some(LOGIN_REQUIRED_MESSAGE));
    assert_eq!(api.write_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.page_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_signed_out_status_checks_are_silent() {
    let api = FakeApi::with_wishlist(&[1]);
    let coordinator = signed_out(&api);

    coordinator.check_status_batch(&ids(&[1]));
    assert!(!coordinator.check_status(p(1)).await);
    assert_eq!(coordinator.refresh_count().await, None);

    advance(500).await;
    assert!(api.batch_calls().is_empty());
    assert_eq!(coordinator.notice(), None);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_resets_state() {
    let api = FakeApi::with_wishlist(&[1]);
    let (coordinator, session) = coordinator(&api);
    coordinator.watch_session();

    coordinator.load_page(1, 20).await.unwrap();
    coordinator.check_status_batch(&ids(&[5]));
    assert_eq!(coordinator.cached_len(), 1);

    assert!(session.sign_out());
    advance(1).await;

    assert_eq!(coordinator.cached_len(), 0);
    assert_eq!(coordinator.wishlist_count(), None);
    assert!(coordinator.loaded_page().is_none());
    assert!(coordinator.pending_ids().is_empty());
    assert_eq!(coordinator.batch_phase(), BatchPhase::Idle);

    advance(500).await;
    assert!(api.batch_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_releases_in_flight_page_load() {
    let api = FakeApi::with_wishlist(&[1]);
    api.set_delay(Duration::from_secs(1));
    let (coordinator, session) = coordinator(&api);
    coordinator.watch_session();

    let stale = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.load_page(1, 20).await }
    });
    advance(10).await;
    assert!(coordinator.active_requests().contains(RequestKey::WishlistPage(1)));

    assert!(session.sign_out());
    advance(1).await;
    assert!(coordinator.active_requests().is_empty());

    session
        .sign_in(secrecy::SecretString::from("test-token"))
        .unwrap();
    advance(1).await;

    // The old request is still outstanding but no longer blocks page 1.
    let fresh = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.load_page(1, 20).await }
    });
    advance(10).await;
    assert_eq!(api.page_calls.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.active_requests().len(), 1);

    // The stale guard finishing must not release the fresh claim.
    advance(985).await;
    assert!(stale.is_finished());
    assert!(coordinator.active_requests().contains(RequestKey::WishlistPage(1)));

    assert!(stale.await.unwrap().is_none());
    assert_eq!(fresh.await.unwrap().unwrap().items.len(), 1);
    assert!(coordinator.active_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_as_new_user_resets_state() {
    let api = FakeApi::with_wishlist(&[1]);
    let (coordinator, session) = coordinator(&api);
    coordinator.watch_session();

    assert!(coordinator.check_status(p(1)).await);
    session
        .sign_in(secrecy::SecretString::from("other-user"))
        .unwrap();
    advance(1).await;

    assert_eq!(coordinator.cached_status(p(1)), None);
}

#[tokio::test(start_paused = true)]
async fn test_batch_from_before_reset_is_discarded() {
    let api = FakeApi::with_wishlist(&[1]);
    api.set_delay(Duration::from_secs(1));
    let (coordinator, _session) = coordinator(&api);

    coordinator.check_status_batch(&ids(&[1]));
    advance(150).await;
    assert_eq!(coordinator.batch_phase(), BatchPhase::Draining);

    coordinator.reset();
    assert_eq!(coordinator.batch_phase(), BatchPhase::Idle);

    advance(2000).await;
    assert_eq!(coordinator.cached_status(p(1)), None);
    assert_eq!(coordinator.wishlist_count(), None);
}

#[tokio::test(start_paused = true)]
async fn test_reset_keeps_notice() {
    let api = FakeApi::with_wishlist(&[]);
    api.fail_writes.store(true, Ordering::SeqCst);
    let (coordinator, _session) = coordinator(&api);

    coordinator.add_to_wishlist(p(1)).await;
    coordinator.reset();
    assert!(coordinator.notice().is_some());

    coordinator.dismiss_notice();
    assert_eq!(coordinator.notice(), None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_pending_and_wakes_waiters() {
    let api = FakeApi::with_wishlist(&[1]);
    let (coordinator, _session) = coordinator(&api);

    let (status, ()) = tokio::join!(coordinator.check_status(p(1)), async {
        coordinator.shutdown();
    });
    assert!(!status);
    assert!(coordinator.pending_ids().is_empty());

    advance(500).await;
    assert!(api.batch_calls().is_empty());
}
