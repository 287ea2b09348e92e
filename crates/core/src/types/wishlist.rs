//! Wishlist wire types.
//!
//! These mirror the JSON bodies of the backend's `/wishlist` endpoints
//! (camelCase field names).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};
use super::product::Product;

/// Pagination metadata shared by paged endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub total: u32,
}

impl Pagination {
    /// Build pagination metadata for `total` items split into pages of `limit`.
    #[must_use]
    pub const fn for_total(page: u32, limit: u32, total: u32) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
            total,
        }
    }
}

/// A product saved to the shopper's wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub product: Product,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

impl WishlistItem {
    /// ID of the wishlisted product.
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product.id
    }
}

/// Response of `GET /wishlist?page&limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistPage {
    pub items: Vec<WishlistItem>,
    pub pagination: Pagination,
}

/// Body of `POST /wishlist/status/batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusRequest {
    pub product_ids: Vec<ProductId>,
}

/// Membership status of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStatus {
    pub product_id: ProductId,
    pub in_wishlist: bool,
}

/// Response of `POST /wishlist/status/batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusResponse {
    pub statuses: Vec<ProductStatus>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// Response of `GET /wishlist/count`, `POST /wishlist/{id}` and
/// `DELETE /wishlist/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistCount {
    pub count: u32,
}

/// Response of `DELETE /wishlist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearWishlistResponse {
    pub deleted_count: u32,
    pub count: u32,
}
