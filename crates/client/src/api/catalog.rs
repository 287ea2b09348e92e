//! Product and order endpoints.

use reqwest::Method;
use shopfront_core::{Order, OrderId, OrderPage, Product, ProductId, ProductPage};
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::{ApiClient, AuthMode};
use crate::error::ApiError;

impl ApiClient {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let builder = self.request(
            Method::GET,
            &format!("products/{id}"),
            &[],
            AuthMode::Optional,
        )?;
        let product: Product = self.send(builder, AuthMode::Optional).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List products, optionally filtered by a search term.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<ProductPage, ApiError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let cache_key = CacheKey::Products {
            page,
            limit,
            search: search.map(String::from),
        };

        if let Some(CacheValue::Products(listing)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product listing");
            return Ok(listing);
        }

        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some(term) = search {
            query.push(("search", term.to_string()));
        }
        let builder = self.request(Method::GET, "products", &query, AuthMode::Optional)?;
        let listing: ProductPage = self.send(builder, AuthMode::Optional).await?;

        // Individual products from the listing are cached as well.
        for product in &listing.products {
            self.inner
                .cache
                .insert(
                    CacheKey::Product(product.id),
                    CacheValue::Product(Box::new(product.clone())),
                )
                .await;
        }
        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(listing.clone()))
            .await;

        Ok(listing)
    }

    /// Drop all cached catalog data.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // Order Methods
    // =========================================================================

    /// List the signed-in shopper's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` without a request if signed out,
    /// or an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, page: u32, limit: u32) -> Result<OrderPage, ApiError> {
        let query = [("page", page.to_string()), ("limit", limit.to_string())];
        let builder = self.request(Method::GET, "orders", &query, AuthMode::Required)?;
        self.send(builder, AuthMode::Required).await
    }

    /// Get one order for tracking.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist or belongs to
    /// someone else, or an error if the API request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ApiError> {
        self.authed(Method::GET, &format!("orders/{id}")).await
    }
}
