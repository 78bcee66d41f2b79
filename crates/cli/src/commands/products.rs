//! Catalog listing command.
//!
//! # Usage
//!
//! ```bash
//! dawa products products/ --field results
//! dawa products categories/3/products/ --field products
//! ```

use dawa_storefront::{AppContext, StorefrontError};

/// Fetch a listing and print each product on one line.
///
/// # Errors
///
/// Returns an error if the fetch fails.
pub async fn list(ctx: &AppContext, path: &str, field: &str) -> Result<(), StorefrontError> {
    let products = ctx.products(path, field).await?;

    tracing::info!("{} product(s) at {}", products.len(), path);
    for product in &products {
        let discount = product
            .discount_percent()
            .map(|pct| format!(" (-{pct}%)"))
            .unwrap_or_default();
        tracing::info!(
            "  [{}] {} - {}{} - {} order(s), rating {:.1}",
            product.id,
            product.name,
            product.price,
            discount,
            product.orders,
            product.rating
        );
    }
    Ok(())
}
