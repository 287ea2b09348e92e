//! Wishlist endpoints.

use async_trait::async_trait;
use reqwest::Method;
use shopfront_core::{
    BatchStatusRequest, BatchStatusResponse, ClearWishlistResponse, ProductId, WishlistCount,
    WishlistPage,
};
use tracing::instrument;

use super::{ApiClient, AuthMode};
use crate::error::ApiError;
use crate::wishlist::WishlistApi;

#[async_trait]
impl WishlistApi for ApiClient {
    #[instrument(skip(self))]
    async fn fetch_wishlist(&self, page: u32, limit: u32) -> Result<WishlistPage, ApiError> {
        let query = [("page", page.to_string()), ("limit", limit.to_string())];
        let builder = self.request(Method::GET, "wishlist", &query, AuthMode::Required)?;
        self.send(builder, AuthMode::Required).await
    }

    #[instrument(skip(self))]
    async fn fetch_wishlist_count(&self) -> Result<u32, ApiError> {
        let response: WishlistCount = self.authed(Method::GET, "wishlist/count").await?;
        Ok(response.count)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_to_wishlist(&self, product_id: ProductId) -> Result<u32, ApiError> {
        let response: WishlistCount = self
            .authed(Method::POST, &format!("wishlist/{product_id}"))
            .await?;
        Ok(response.count)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_from_wishlist(&self, product_id: ProductId) -> Result<u32, ApiError> {
        let response: WishlistCount = self
            .authed(Method::DELETE, &format!("wishlist/{product_id}"))
            .await?;
        Ok(response.count)
    }

    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    async fn check_wishlist_status(
        &self,
        product_ids: &[ProductId],
    ) -> Result<BatchStatusResponse, ApiError> {
        let body = BatchStatusRequest {
            product_ids: product_ids.to_vec(),
        };
        let builder = self
            .request(
                Method::POST,
                "wishlist/status/batch",
                &[],
                AuthMode::Required,
            )?
            .json(&body);
        self.send(builder, AuthMode::Required).await
    }

    #[instrument(skip(self))]
    async fn clear_wishlist(&self) -> Result<ClearWishlistResponse, ApiError> {
        self.authed(Method::DELETE, "wishlist").await
    }
}
