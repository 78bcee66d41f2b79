//! Wishlist commands.
//!
//! # Usage
//!
//! ```bash
//! dawa wishlist list
//! dawa wishlist check 42
//! dawa wishlist toggle 42
//! dawa wishlist remove 42
//! ```
//!
//! # Environment Variables
//!
//! - `DAWA_API_TOKEN` - Session token of the user whose wishlist is edited

use dawa_core::{Product, ProductId};
use dawa_storefront::{AppContext, StorefrontError};

/// Print every wishlist item.
///
/// # Errors
///
/// Returns an error if no user is signed in or the fetch fails.
pub async fn list(ctx: &AppContext) -> Result<(), StorefrontError> {
    load(ctx).await?;

    let items = ctx.wishlist().items();
    tracing::info!("{} item(s) in wishlist", items.len());
    for item in &items {
        print_item(item);
    }
    Ok(())
}

/// Report whether `id` is in the wishlist.
///
/// # Errors
///
/// Returns an error if no user is signed in or the fetch fails.
pub async fn check(ctx: &AppContext, id: &ProductId) -> Result<(), StorefrontError> {
    load(ctx).await?;

    if ctx.wishlist().is_in_wishlist(id) {
        tracing::info!("{id} is in the wishlist");
    } else {
        tracing::info!("{id} is not in the wishlist");
    }
    Ok(())
}

/// Flip membership of `id`.
///
/// # Errors
///
/// Returns an error if no user is signed in or the initial fetch fails.
/// A rejected toggle is not an error; it is reported as unchanged.
pub async fn toggle(ctx: &AppContext, id: ProductId) -> Result<(), StorefrontError> {
    load(ctx).await?;

    let before = ctx.wishlist().is_in_wishlist(&id);
    ctx.wishlist().toggle(id.clone(), None).await;
    report(ctx, &id, before);
    Ok(())
}

/// Remove `id` if it is in the wishlist.
///
/// # Errors
///
/// Returns an error if no user is signed in or the initial fetch fails.
pub async fn remove(ctx: &AppContext, id: ProductId) -> Result<(), StorefrontError> {
    load(ctx).await?;

    let before = ctx.wishlist().is_in_wishlist(&id);
    if !before {
        tracing::info!("{id} is not in the wishlist; nothing to remove");
        return Ok(());
    }
    ctx.wishlist().remove_item(id.clone()).await;
    report(ctx, &id, before);
    Ok(())
}

async fn load(ctx: &AppContext) -> Result<(), StorefrontError> {
    if !ctx.session().is_signed_in() {
        return Err(StorefrontError::NotSignedIn);
    }
    ctx.wishlist().refresh().await?;
    Ok(())
}

fn report(ctx: &AppContext, id: &ProductId, before: bool) {
    let after = ctx.wishlist().is_in_wishlist(id);
    match (before, after) {
        (false, true) => tracing::info!("Added {id} to the wishlist"),
        (true, false) => tracing::info!("Removed {id} from the wishlist"),
        _ => tracing::warn!("Wishlist unchanged for {id}; the backend rejected the change"),
    }
    tracing::info!("{} item(s) in wishlist", ctx.wishlist().count());
}

fn print_item(item: &Product) {
    let name = if item.name.is_empty() {
        "(unnamed)"
    } else {
        item.name.as_str()
    };
    tracing::info!(
        "  [{}] {} - {} (added {})",
        item.id,
        name,
        if item.price.is_empty() { "-" } else { item.price.as_str() },
        item.date_added
    );
}
