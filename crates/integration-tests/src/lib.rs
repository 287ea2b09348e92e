//! Integration test support for Shopfront.
//!
//! [`MockBackend`] is an in-process `axum` server that speaks the backend
//! REST contract (auth, products, orders, wishlist). It binds to
//! `127.0.0.1:0`, so tests run in parallel without port clashes, and it
//! records what it was asked so tests can assert on request batching.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Seed Data
//!
//! - `shopper@example.com` / `hunter2` (user 1, two orders)
//! - `other@example.com` / `password` (user 2)
//! - Products 1 to 30

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shopfront_client::{ApiClient, ClientConfig, MemoryTokenStore, Session};
use shopfront_core::{
    BatchStatusRequest, BatchStatusResponse, ClearWishlistResponse, CurrencyCode, Email,
    LoginResponse, Order, OrderId, OrderLine, OrderPage, OrderStatus, Pagination, PaymentMethod,
    PaymentStatus, Price, Product, ProductId, ProductPage, ProductStatus, User, UserId,
    WishlistCount, WishlistItem, WishlistPage,
};
use tokio::task::JoinHandle;

/// Password of every seeded shopper except `other@example.com`.
pub const SHOPPER_PASSWORD: &str = "hunter2";
pub const SHOPPER_EMAIL: &str = "shopper@example.com";
pub const OTHER_EMAIL: &str = "other@example.com";

/// Message returned by write endpoints while writes are failing.
pub const WRITE_FAILURE_MESSAGE: &str = "Wishlist is temporarily unavailable";

const PRODUCT_COUNT: i64 = 30;

// =============================================================================
// MockBackend
// =============================================================================

/// Running mock backend. The server stops when this is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Start a seeded backend on an ephemeral port.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::seeded());
        let app = Router::new().nest("/api", routes(Arc::clone(&state)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// API base URL, e.g. `http://127.0.0.1:54321/api`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration pointing at this backend.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_api_url(&self.url()).expect("Mock backend URL is valid")
    }

    /// Client with no stored token.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config(), Session::new(MemoryTokenStore::new()))
            .expect("Failed to build client")
    }

    /// Client already holding a valid token for `email`.
    #[must_use]
    pub fn signed_in_client(&self, email: &str) -> ApiClient {
        let token = self.issue_token(email);
        ApiClient::new(
            &self.config(),
            Session::new(MemoryTokenStore::with_token(&token)),
        )
        .expect("Failed to build client")
    }

    /// Mint a token for `email` without going through `/auth/login`.
    #[must_use]
    pub fn issue_token(&self, email: &str) -> String {
        let mut data = self.state.lock();
        let user_id = data.account(email).user.id;
        data.issue_token(user_id)
    }

    /// Invalidate every issued token; subsequent requests get `401`.
    pub fn revoke_tokens(&self) {
        self.state.lock().tokens.clear();
    }

    /// Replace `email`'s wishlist.
    pub fn seed_wishlist(&self, email: &str, ids: &[i64]) {
        let mut data = self.state.lock();
        let user_id = data.account(email).user.id;
        let added_at = seed_time();
        data.wishlists.insert(
            user_id,
            ids.iter()
                .map(|&id| (ProductId::new(id), added_at))
                .collect(),
        );
    }

    /// Product ids in `email`'s wishlist, in insertion order.
    #[must_use]
    pub fn wishlist_ids(&self, email: &str) -> Vec<ProductId> {
        let data = self.state.lock();
        let user_id = data.account(email).user.id;
        data.wishlists
            .get(&user_id)
            .map(|items| items.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }

    /// Bodies of every `POST /wishlist/status/batch` received, in order.
    #[must_use]
    pub fn batch_calls(&self) -> Vec<Vec<ProductId>> {
        self.state.lock().batch_calls.clone()
    }

    /// Number of requests received by the named route (e.g. `"GET /products/{id}"`).
    #[must_use]
    pub fn hits(&self, route: &str) -> usize {
        self.state.lock().hits.get(route).copied().unwrap_or(0)
    }

    /// `x-request-id` header of the most recent request.
    #[must_use]
    pub fn last_request_id(&self) -> Option<String> {
        self.state.lock().last_request_id.clone()
    }

    /// Make add/remove/clear answer `500`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make `POST /wishlist/status/batch` answer 503.
    pub fn set_fail_batches(&self, fail: bool) {
        self.state.lock().fail_batches = fail;
    }

    /// Latency of `POST /wishlist/status/batch`.
    pub fn set_batch_delay(&self, delay: Duration) {
        self.state.lock().batch_delay = delay;
    }

    /// Latency of `GET /wishlist` and `GET /wishlist/count`.
    pub fn set_read_delay(&self, delay: Duration) {
        self.state.lock().read_delay = delay;
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// State
// =============================================================================

struct MockState {
    data: Mutex<MockData>,
}

struct Account {
    password: String,
    user: User,
}

struct MockData {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, UserId>,
    next_token: u64,
    products: BTreeMap<ProductId, Product>,
    orders: Vec<(UserId, Order)>,
    wishlists: HashMap<UserId, Vec<(ProductId, DateTime<Utc>)>>,
    batch_calls: Vec<Vec<ProductId>>,
    hits: HashMap<String, usize>,
    last_request_id: Option<String>,
    fail_writes: bool,
    fail_batches: bool,
    batch_delay: Duration,
    read_delay: Duration,
}

impl MockState {
    fn seeded() -> Self {
        let mut accounts = HashMap::new();
        for (id, email, password, name) in [
            (1, SHOPPER_EMAIL, SHOPPER_PASSWORD, "Sam Shopper"),
            (2, OTHER_EMAIL, "password", "Olive Other"),
        ] {
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    user: User {
                        id: UserId::new(id),
                        email: Email::parse(email).unwrap(),
                        name: Some(name.to_string()),
                        is_admin: false,
                    },
                },
            );
        }

        let products = (1..=PRODUCT_COUNT)
            .map(|id| (ProductId::new(id), seed_product(id)))
            .collect();

        let orders = vec![
            (UserId::new(1), seed_order(1002, OrderStatus::Shipped, &[3, 7])),
            (UserId::new(1), seed_order(1001, OrderStatus::Delivered, &[1])),
            (UserId::new(2), seed_order(2001, OrderStatus::Pending, &[5])),
        ];

        Self {
            data: Mutex::new(MockData {
                accounts,
                tokens: HashMap::new(),
                next_token: 0,
                products,
                orders,
                wishlists: HashMap::new(),
                batch_calls: Vec::new(),
                hits: HashMap::new(),
                last_request_id: None,
                fail_writes: false,
                fail_batches: false,
                batch_delay: Duration::ZERO,
                read_delay: Duration::ZERO,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the request and resolve its bearer token, if any.
    fn observe(&self, route: &str, headers: &HeaderMap) -> Option<UserId> {
        let mut data = self.lock();
        *data.hits.entry(route.to_string()).or_default() += 1;
        data.last_request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        data.tokens.get(token).copied()
    }

    /// Like [`Self::observe`] but rejects anonymous requests.
    fn authenticate(&self, route: &str, headers: &HeaderMap) -> Result<UserId, Failure> {
        self.observe(route, headers)
            .ok_or(Failure(StatusCode::UNAUTHORIZED, "Authentication required"))
    }
}

impl MockData {
    fn account(&self, email: &str) -> &Account {
        self.accounts
            .get(email)
            .unwrap_or_else(|| panic!("No seeded account for {email}"))
    }

    fn issue_token(&mut self, user_id: UserId) -> String {
        self.next_token += 1;
        let token = format!("token-{user_id}-{}", self.next_token);
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn wishlist_count(&self, user_id: UserId) -> u32 {
        self.wishlists
            .get(&user_id)
            .map_or(0, |items| u32::try_from(items.len()).unwrap())
    }
}

fn seed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

fn seed_product(id: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Pineapple Print No. {id}"),
        description: Some(format!("Limited run print #{id}")),
        price: Price::new(Decimal::new(id * 100 + 99, 2), CurrencyCode::USD),
        image_url: Some(format!("https://cdn.example.com/products/{id}.jpg")),
        in_stock: id % 7 != 0,
        variants: Vec::new(),
    }
}

fn seed_order(id: i64, status: OrderStatus, product_ids: &[i64]) -> Order {
    let lines: Vec<OrderLine> = product_ids
        .iter()
        .map(|&pid| {
            let product = seed_product(pid);
            OrderLine {
                product_id: product.id,
                variant_id: None,
                name: product.name,
                quantity: 1,
                unit_price: product.price,
            }
        })
        .collect();
    let total = lines.iter().map(|l| l.unit_price.amount).sum();

    Order {
        id: OrderId::new(id),
        status,
        payment_status: PaymentStatus::Paid,
        payment_method: Some(PaymentMethod::Card),
        total: Price::new(total, CurrencyCode::USD),
        created_at: seed_time(),
        estimated_delivery: None,
        tracking_number: (status == OrderStatus::Shipped).then(|| format!("TRK{id}")),
        lines,
    }
}

// =============================================================================
// Routes
// =============================================================================

type Shared = State<Arc<MockState>>;

/// Error response with the backend's `{"message": ...}` body.
struct Failure(StatusCode, &'static str);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "message": self.1 }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
}

impl ListQuery {
    fn window(&self) -> (u32, u32) {
        (self.page.unwrap_or(1).max(1), self.limit.unwrap_or(12).max(1))
    }
}

fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> (Vec<T>, Pagination) {
    let total = u32::try_from(items.len()).unwrap();
    let skip = usize::try_from(page.saturating_sub(1) * limit).unwrap();
    let slice = items
        .iter()
        .skip(skip)
        .take(usize::try_from(limit).unwrap())
        .cloned()
        .collect();
    (slice, Pagination::for_total(page, limit, total))
}

fn routes(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/wishlist", get(list_wishlist).delete(clear_wishlist))
        .route("/wishlist/count", get(wishlist_count))
        .route("/wishlist/status/batch", post(batch_status))
        .route(
            "/wishlist/{id}",
            post(add_to_wishlist).delete(remove_from_wishlist),
        )
        .with_state(state)
}

async fn login(State(state): Shared, headers: HeaderMap, Json(body): Json<Credentials>) -> Response {
    state.observe("POST /auth/login", &headers);
    let mut data = state.lock();

    let user = match data.accounts.get(body.email.trim()) {
        Some(account) if account.password == body.password => account.user.clone(),
        _ => {
            return Failure(StatusCode::UNAUTHORIZED, "Invalid email or password").into_response();
        }
    };
    let token = data.issue_token(user.id);
    Json(LoginResponse { token, user }).into_response()
}

async fn me(State(state): Shared, headers: HeaderMap) -> Result<Json<User>, Failure> {
    let user_id = state.authenticate("GET /auth/me", &headers)?;
    let data = state.lock();
    data.accounts
        .values()
        .find(|a| a.user.id == user_id)
        .map(|a| Json(a.user.clone()))
        .ok_or(Failure(StatusCode::NOT_FOUND, "User not found"))
}

async fn list_products(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Json<ProductPage> {
    state.observe("GET /products", &headers);
    let (page, limit) = query.window();
    let data = state.lock();

    let term = query.search.as_deref().map(str::to_lowercase);
    let matching: Vec<Product> = data
        .products
        .values()
        .filter(|p| {
            term.as_deref()
                .is_none_or(|t| p.name.to_lowercase().contains(t))
        })
        .cloned()
        .collect();

    let (products, pagination) = paginate(&matching, page, limit);
    Json(ProductPage {
        products,
        pagination,
    })
}

async fn get_product(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, Failure> {
    state.observe("GET /products/{id}", &headers);
    state
        .lock()
        .products
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(Failure(StatusCode::NOT_FOUND, "Product not found"))
}

async fn list_orders(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderPage>, Failure> {
    let user_id = state.authenticate("GET /orders", &headers)?;
    let (page, limit) = query.window();
    let data = state.lock();

    let mine: Vec<Order> = data
        .orders
        .iter()
        .filter(|(owner, _)| *owner == user_id)
        .map(|(_, order)| order.clone())
        .collect();
    let (orders, pagination) = paginate(&mine, page, limit);
    Ok(Json(OrderPage { orders, pagination }))
}

async fn get_order(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, Failure> {
    let user_id = state.authenticate("GET /orders/{id}", &headers)?;
    state
        .lock()
        .orders
        .iter()
        .find(|(owner, order)| *owner == user_id && order.id == id)
        .map(|(_, order)| Json(order.clone()))
        .ok_or(Failure(StatusCode::NOT_FOUND, "Order not found"))
}

async fn list_wishlist(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<WishlistPage>, Failure> {
    let user_id = state.authenticate("GET /wishlist", &headers)?;
    let delay = state.lock().read_delay;
    tokio::time::sleep(delay).await;

    let (page, limit) = query.window();
    let data = state.lock();
    let entries: Vec<WishlistItem> = data
        .wishlists
        .get(&user_id)
        .into_iter()
        .flatten()
        .filter_map(|(id, added_at)| {
            data.products.get(id).map(|product| WishlistItem {
                product: product.clone(),
                added_at: *added_at,
                variant_id: None,
            })
        })
        .collect();

    let (items, pagination) = paginate(&entries, page, limit);
    Ok(Json(WishlistPage { items, pagination }))
}

async fn wishlist_count(
    State(state): Shared,
    headers: HeaderMap,
) -> Result<Json<WishlistCount>, Failure> {
    let user_id = state.authenticate("GET /wishlist/count", &headers)?;
    let delay = state.lock().read_delay;
    tokio::time::sleep(delay).await;

    let count = state.lock().wishlist_count(user_id);
    Ok(Json(WishlistCount { count }))
}

async fn add_to_wishlist(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
) -> Result<Json<WishlistCount>, Failure> {
    let user_id = state.authenticate("POST /wishlist/{id}", &headers)?;
    let mut data = state.lock();
    if data.fail_writes {
        return Err(Failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            WRITE_FAILURE_MESSAGE,
        ));
    }
    if !data.products.contains_key(&id) {
        return Err(Failure(StatusCode::NOT_FOUND, "Product not found"));
    }

    let items = data.wishlists.entry(user_id).or_default();
    if !items.iter().any(|(existing, _)| *existing == id) {
        items.push((id, Utc::now()));
    }
    Ok(Json(WishlistCount {
        count: data.wishlist_count(user_id),
    }))
}

async fn remove_from_wishlist(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
) -> Result<Json<WishlistCount>, Failure> {
    let user_id = state.authenticate("DELETE /wishlist/{id}", &headers)?;
    let mut data = state.lock();
    if data.fail_writes {
        return Err(Failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            WRITE_FAILURE_MESSAGE,
        ));
    }

    if let Some(items) = data.wishlists.get_mut(&user_id) {
        items.retain(|(existing, _)| *existing != id);
    }
    Ok(Json(WishlistCount {
        count: data.wishlist_count(user_id),
    }))
}

async fn clear_wishlist(
    State(state): Shared,
    headers: HeaderMap,
) -> Result<Json<ClearWishlistResponse>, Failure> {
    let user_id = state.authenticate("DELETE /wishlist", &headers)?;
    let mut data = state.lock();
    if data.fail_writes {
        return Err(Failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            WRITE_FAILURE_MESSAGE,
        ));
    }

    let deleted_count = data.wishlist_count(user_id);
    data.wishlists.remove(&user_id);
    Ok(Json(ClearWishlistResponse {
        deleted_count,
        count: 0,
    }))
}

async fn batch_status(
    State(state): Shared,
    headers: HeaderMap,
    Json(body): Json<BatchStatusRequest>,
) -> Result<Json<BatchStatusResponse>, Failure> {
    let user_id = state.authenticate("POST /wishlist/status/batch", &headers)?;
    let (delay, fail) = {
        let mut data = state.lock();
        data.batch_calls.push(body.product_ids.clone());
        (data.batch_delay, data.fail_batches)
    };
    tokio::time::sleep(delay).await;
    if fail {
        return Err(Failure(
            StatusCode::SERVICE_UNAVAILABLE,
            WRITE_FAILURE_MESSAGE,
        ));
    }

    let data = state.lock();
    let wishlist = data.wishlists.get(&user_id);
    let statuses = body
        .product_ids
        .iter()
        .map(|&product_id| ProductStatus {
            product_id,
            in_wishlist: wishlist.is_some_and(|items| items.iter().any(|(id, _)| *id == product_id)),
        })
        .collect();

    Ok(Json(BatchStatusResponse {
        statuses,
        count: Some(data.wishlist_count(user_id)),
    }))
}
