//! Product and order commands.

use shopfront_core::{Order, OrderId, Pagination, ProductId};

use super::{CliError, Context};

pub async fn product(ctx: &Context, id: ProductId) -> Result<(), CliError> {
    let product = ctx.client.get_product(id).await?;
    println!("{} - {}", product.name, product.price);
    println!("  id:       {}", product.id);
    println!("  in stock: {}", if product.in_stock { "yes" } else { "no" });
    if let Some(description) = &product.description {
        println!("  {description}");
    }
    for variant in &product.variants {
        let price = variant
            .price
            .as_ref()
            .map_or_else(String::new, |p| format!(" ({p})"));
        println!("  - {} [{}]{price}", variant.name, variant.id);
    }

    if ctx.client.session().is_authenticated() && ctx.wishlist.check_status(id).await {
        println!("  ♥ in your wishlist");
    }
    Ok(())
}

pub async fn products(
    ctx: &Context,
    page: u32,
    limit: Option<u32>,
    search: Option<&str>,
) -> Result<(), CliError> {
    let listing = ctx
        .client
        .list_products(page, ctx.page_size(limit), search)
        .await?;

    // One batch request covers every product on the page.
    let ids: Vec<ProductId> = listing.products.iter().map(|p| p.id).collect();
    let statuses = ctx.wishlist.check_statuses(&ids).await;

    for (product, (_, wishlisted)) in listing.products.iter().zip(statuses) {
        let marker = if wishlisted { "♥" } else { " " };
        println!("{marker} {:>6}  {}  {}", product.id, product.name, product.price);
    }
    print_pagination(&listing.pagination);
    Ok(())
}

pub async fn orders(ctx: &Context, page: u32, limit: Option<u32>) -> Result<(), CliError> {
    let listing = ctx.client.list_orders(page, ctx.page_size(limit)).await?;
    if listing.orders.is_empty() {
        println!("No orders yet");
        return Ok(());
    }
    for order in &listing.orders {
        println!(
            "#{:<8} {}  {:<10} {}",
            order.id,
            order.created_at.format("%Y-%m-%d"),
            order.status,
            order.total
        );
    }
    print_pagination(&listing.pagination);
    Ok(())
}

pub async fn order(ctx: &Context, id: OrderId) -> Result<(), CliError> {
    let order = ctx.client.get_order(id).await?;
    print_order(&order);
    Ok(())
}

fn print_order(order: &Order) {
    println!("Order #{} ({})", order.id, order.status);
    println!("  placed:   {}", order.created_at.format("%Y-%m-%d %H:%M"));
    println!("  payment:  {}", order.payment_status);
    if let Some(eta) = order.estimated_delivery {
        println!("  arrives:  {}", eta.format("%Y-%m-%d"));
    }
    if let Some(tracking) = &order.tracking_number {
        println!("  tracking: {tracking}");
    }
    for line in &order.lines {
        println!("  {} x {} @ {}", line.quantity, line.name, line.unit_price);
    }
    println!("  total:    {}", order.total);
}

pub fn print_pagination(pagination: &Pagination) {
    println!(
        "Page {} of {} ({} total)",
        pagination.page,
        pagination.total_pages.max(1),
        pagination.total
    );
}
