//! End-to-end tests for the wishlist flow over real HTTP.
//!
//! Each test spawns its own in-process backend, so tests are independent
//! and can run in parallel.

#![allow(clippy::unwrap_used)]

use dawa_core::{ProductId, UserId};
use dawa_integration_tests::{TEST_TOKEN, TestBackend, config_for};
use dawa_storefront::{ApiClient, ApiError, AppContext, Identity, WishlistBackend};
use secrecy::SecretString;
use serde_json::{Value, json};

fn wrapped(id: i64, name: &str, date_added: &str) -> Value {
    json!({
        "date_added": date_added,
        "item": {"id": id, "item_name": name, "item_price": "12.50"},
    })
}

fn token() -> SecretString {
    SecretString::from(TEST_TOKEN.to_string())
}

async fn context_with(backend: &TestBackend) -> AppContext {
    let base_url = backend.spawn().await;
    AppContext::new(config_for(&base_url, Some(TEST_TOKEN))).unwrap()
}

// =============================================================================
// ApiClient
// =============================================================================

#[tokio::test]
async fn test_fetch_wishlist_normalizes_wrapped_rows() {
    let backend = TestBackend::with_wishlist(vec![
        wrapped(1, "Clay Pot", "2026-10-01T10:00:00Z"),
        wrapped(2, "Brass Lamp", "2026-10-02T10:00:00Z"),
    ]);
    let base_url = backend.spawn().await;
    let client = ApiClient::new(&config_for(&base_url, None).api).unwrap();

    let items = client.fetch_wishlist(&token()).await.unwrap();

    assert_eq!(items.len(), 2);
    let first = items.first().unwrap();
    assert_eq!(first.id, ProductId::from("1"));
    assert_eq!(first.name, "Clay Pot");
    assert_eq!(first.price, "12.50");
    assert_eq!(first.date_added, "2026-10-01T10:00:00Z");
    assert_eq!(backend.state().wishlist_fetches, 1);
}

#[tokio::test]
async fn test_fetch_wishlist_with_malformed_payload_is_empty() {
    let backend = TestBackend::with_wishlist(vec![wrapped(1, "Clay Pot", "2026-10-01T10:00:00Z")]);
    backend.state().malformed_wishlist = true;
    let base_url = backend.spawn().await;
    let client = ApiClient::new(&config_for(&base_url, None).api).unwrap();

    let items = client.fetch_wishlist(&token()).await.unwrap();

    assert!(items.is_empty());
}

#[tokio::test]
async fn test_fetch_wishlist_with_bad_token_is_unauthorized() {
    let backend = TestBackend::default();
    let base_url = backend.spawn().await;
    let client = ApiClient::new(&config_for(&base_url, None).api).unwrap();

    let result = client
        .fetch_wishlist(&SecretString::from("wrong".to_string()))
        .await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

// =============================================================================
// Wishlist store over HTTP
// =============================================================================

#[tokio::test]
async fn test_toggle_adds_then_removes() {
    let backend = TestBackend::with_wishlist(vec![wrapped(1, "Clay Pot", "2026-10-01T10:00:00Z")]);
    let ctx = context_with(&backend).await;
    let wishlist = ctx.wishlist();
    wishlist.refresh().await.unwrap();
    assert!(wishlist.is_in_wishlist(&ProductId::from("1")));

    let product = json!({"id": 7, "item_name": "Woven Basket"});
    wishlist.toggle(ProductId::from("7"), Some(&product)).await;

    assert!(wishlist.is_in_wishlist(&ProductId::from("7")));
    assert_eq!(wishlist.count(), 2);
    assert_eq!(
        wishlist.items().first().map(|item| item.id.clone()),
        Some(ProductId::from("7"))
    );
    assert_eq!(backend.state().wishlist.len(), 2);

    wishlist.toggle(ProductId::from("7"), None).await;

    assert!(!wishlist.is_in_wishlist(&ProductId::from("7")));
    assert_eq!(wishlist.count(), 1);
    assert!(!wishlist.has_pending());
    assert_eq!(backend.state().toggle_calls, 2);
}

#[tokio::test]
async fn test_server_error_rolls_back() {
    let backend = TestBackend::with_wishlist(vec![wrapped(1, "Clay Pot", "2026-10-01T10:00:00Z")]);
    let ctx = context_with(&backend).await;
    let wishlist = ctx.wishlist();
    wishlist.refresh().await.unwrap();
    backend.state().fail_toggles = true;

    let settle = wishlist.remove_item(ProductId::from("1"));
    assert!(!wishlist.is_in_wishlist(&ProductId::from("1")));
    settle.await;

    assert!(wishlist.is_in_wishlist(&ProductId::from("1")));
    assert_eq!(wishlist.items().len(), 1);
    assert!(!wishlist.has_pending());
    // Initial refresh plus the revalidation after rollback
    assert_eq!(backend.state().wishlist_fetches, 2);
}

#[tokio::test]
async fn test_sign_out_clears_wishlist() {
    let backend = TestBackend::with_wishlist(vec![wrapped(1, "Clay Pot", "2026-10-01T10:00:00Z")]);
    let ctx = context_with(&backend).await;
    ctx.wishlist().refresh().await.unwrap();
    assert_eq!(ctx.wishlist().count(), 1);

    ctx.sign_out();

    assert_eq!(ctx.wishlist().count(), 0);
    assert!(ctx.wishlist().items().is_empty());

    ctx.wishlist().toggle(ProductId::from("3"), None).await;
    assert_eq!(backend.state().toggle_calls, 0);

    ctx.sign_in(Identity::new(UserId::new(1), TEST_TOKEN));
    ctx.wishlist().refresh().await.unwrap();
    assert_eq!(ctx.wishlist().count(), 1);
}

// =============================================================================
// Catalog cache
// =============================================================================

#[tokio::test]
async fn test_catalog_listing_is_deduplicated() {
    let backend = TestBackend::default();
    backend.state().products = vec![
        json!({"id": 10, "name": "Clay Pot", "price": 12}),
        json!({"id": 11, "name": "Brass Lamp", "price": "40.00"}),
    ];
    let ctx = context_with(&backend).await;

    let first = ctx.products("products/", "results").await.unwrap();
    let second = ctx.products("products/", "results").await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(backend.state().product_fetches, 1);
}
