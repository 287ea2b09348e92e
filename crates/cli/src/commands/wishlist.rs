//! Wishlist commands.
//!
//! # Usage
//!
//! ```bash
//! shop-cli wishlist list --page 2
//! shop-cli wishlist count
//! shop-cli wishlist add 42
//! shop-cli wishlist toggle 42
//!
//! # Resolved with a single batch request
//! shop-cli wishlist status 1 2 3 42
//! ```

use shopfront_core::ProductId;

use super::catalog::print_pagination;
use super::{CliError, Context};

pub async fn list(ctx: &Context, page: u32, limit: Option<u32>) -> Result<(), CliError> {
    let Some(loaded) = ctx.wishlist.load_page(page, ctx.page_size(limit)).await else {
        return Err(ctx.wishlist_failure("Failed to load wishlist"));
    };

    if loaded.items.is_empty() {
        println!("Your wishlist is empty");
        return Ok(());
    }
    for item in &loaded.items {
        println!(
            "{:>6}  {}  {}  (added {})",
            item.product.id,
            item.product.name,
            item.product.price,
            item.added_at.format("%Y-%m-%d")
        );
    }
    print_pagination(&loaded.pagination);
    Ok(())
}

pub async fn count(ctx: &Context) -> Result<(), CliError> {
    let Some(count) = ctx.wishlist.refresh_count().await else {
        return Err(ctx.wishlist_failure("Failed to fetch wishlist count"));
    };
    println!("{count}");
    Ok(())
}

pub async fn add(ctx: &Context, id: ProductId) -> Result<(), CliError> {
    if !ctx.wishlist.add_to_wishlist(id).await {
        return Err(ctx.wishlist_failure("Failed to add to wishlist"));
    }
    print_change(ctx, id);
    Ok(())
}

pub async fn remove(ctx: &Context, id: ProductId) -> Result<(), CliError> {
    if !ctx.wishlist.remove_from_wishlist(id).await {
        return Err(ctx.wishlist_failure("Failed to remove from wishlist"));
    }
    print_change(ctx, id);
    Ok(())
}

pub async fn toggle(ctx: &Context, id: ProductId) -> Result<(), CliError> {
    // A fresh process knows nothing yet; ask the backend first.
    ctx.wishlist.check_status(id).await;
    if ctx.wishlist.cached_status(id).is_none() {
        return Err(ctx.wishlist_failure("Could not determine wishlist status"));
    }
    if !ctx.wishlist.toggle_wishlist(id).await {
        return Err(ctx.wishlist_failure("Failed to update wishlist"));
    }
    print_change(ctx, id);
    Ok(())
}

pub async fn status(ctx: &Context, ids: &[ProductId]) -> Result<(), CliError> {
    if !ctx.client.session().is_authenticated() {
        return Err(CliError::Wishlist(
            shopfront_client::wishlist::LOGIN_REQUIRED_MESSAGE.to_string(),
        ));
    }
    for (id, in_wishlist) in ctx.wishlist.check_statuses(ids).await {
        println!("{id:>6}  {}", if in_wishlist { "yes" } else { "no" });
    }
    Ok(())
}

pub async fn clear(ctx: &Context) -> Result<(), CliError> {
    if !ctx.wishlist.clear_wishlist().await {
        return Err(ctx.wishlist_failure("Failed to clear wishlist"));
    }
    println!("Wishlist cleared");
    Ok(())
}

fn print_change(ctx: &Context, id: ProductId) {
    let state = if ctx.wishlist.is_in_wishlist(id) {
        "added to"
    } else {
        "removed from"
    };
    match ctx.wishlist.wishlist_count() {
        Some(count) => println!("Product {id} {state} wishlist ({count} items)"),
        None => println!("Product {id} {state} wishlist"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use shopfront_client::WishlistCoordinator;
    use shopfront_integration_tests::{MockBackend, SHOPPER_EMAIL};

    use super::*;

    fn context(backend: &MockBackend) -> Context {
        let config = backend.config();
        let client = backend.signed_in_client(SHOPPER_EMAIL);
        let wishlist = WishlistCoordinator::from_client(&client, config.wishlist);
        Context {
            config,
            client,
            wishlist,
        }
    }

    #[tokio::test]
    async fn test_toggle_flips_server_state() {
        let backend = MockBackend::start().await;
        backend.seed_wishlist(SHOPPER_EMAIL, &[4]);
        let ctx = context(&backend);

        toggle(&ctx, ProductId::new(4)).await.unwrap();
        assert!(backend.wishlist_ids(SHOPPER_EMAIL).is_empty());
    }

    #[tokio::test]
    async fn test_toggle_refuses_when_status_is_unknown() {
        let backend = MockBackend::start().await;
        backend.seed_wishlist(SHOPPER_EMAIL, &[4]);
        backend.set_fail_batches(true);
        let ctx = context(&backend);

        let err = toggle(&ctx, ProductId::new(4)).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not determine wishlist status");
        assert_eq!(backend.hits("POST /wishlist/{id}"), 0);
        assert_eq!(backend.wishlist_ids(SHOPPER_EMAIL), vec![ProductId::new(4)]);
    }
}
