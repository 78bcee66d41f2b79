//! Integration test harness for the Dawa storefront client.
//!
//! Spins up an in-process `axum` server that mimics the marketplace REST
//! backend closely enough to exercise the real HTTP client, cache, and
//! wishlist store end to end.
//!
//! # Usage
//!
//! ```rust,ignore
//! let backend = TestBackend::with_wishlist(vec![json!({"id": 1, "name": "Lamp"})]);
//! let base_url = backend.spawn().await;
//! let ctx = AppContext::new(config_for(&base_url, Some(TEST_TOKEN)))?;
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dawa_core::UserId;
use dawa_storefront::config::{ApiConfig, CacheConfig, Credentials, WishlistConfig};
use dawa_storefront::StorefrontConfig;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

/// Token the test backend accepts.
pub const TEST_TOKEN: &str = "test-session-token";

/// Mutable state of the fake backend, inspectable from tests.
#[derive(Debug, Default)]
pub struct BackendState {
    /// Raw wishlist rows as the backend would send them.
    pub wishlist: Vec<Value>,
    /// Catalog listing served at `products/`.
    pub products: Vec<Value>,
    pub wishlist_fetches: usize,
    pub toggle_calls: usize,
    pub product_fetches: usize,
    /// Answer every toggle with HTTP 500.
    pub fail_toggles: bool,
    /// Answer wishlist fetches with a non-array `wishlist` field.
    pub malformed_wishlist: bool,
}

/// Fake marketplace backend.
#[derive(Clone, Default)]
pub struct TestBackend {
    state: Arc<Mutex<BackendState>>,
}

#[derive(Deserialize)]
struct WishUnwishBody {
    item_id: String,
}

impl TestBackend {
    #[must_use]
    pub fn with_wishlist(rows: Vec<Value>) -> Self {
        let backend = Self::default();
        backend.state().wishlist = rows;
        backend
    }

    /// Lock the backend state for inspection or tweaking.
    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve the backend on an ephemeral local port.
    ///
    /// Returns the API base URL (`http://127.0.0.1:<port>/api/`).
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn spawn(&self) -> String {
        let router = Router::new()
            .route("/api/getuserwishlist/", get(get_wishlist))
            .route("/api/wishunwish/", post(wish_unwish))
            .route("/api/products/", get(get_products))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind test backend");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        format!("http://{addr}/api/")
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Token {TEST_TOKEN}"))
}

async fn get_wishlist(State(backend): State<TestBackend>, headers: HeaderMap) -> Response {
    let mut state = backend.state();
    state.wishlist_fetches += 1;

    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
    }
    if state.malformed_wishlist {
        return Json(json!({"wishlist": {"detail": "unexpected"}})).into_response();
    }
    Json(json!({"wishlist": state.wishlist.clone()})).into_response()
}

async fn wish_unwish(
    State(backend): State<TestBackend>,
    headers: HeaderMap,
    Json(body): Json<WishUnwishBody>,
) -> Response {
    let mut state = backend.state();
    state.toggle_calls += 1;

    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
    }
    if state.fail_toggles {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }

    let position = state.wishlist.iter().position(|row| {
        row.get("item")
            .and_then(|item| item.get("id"))
            .is_some_and(|id| id_matches(id, &body.item_id))
    });
    if let Some(index) = position {
        state.wishlist.remove(index);
        return Json(json!({"message": "removed"})).into_response();
    }

    let row = json!({
        "date_added": "2026-10-18T09:00:00Z",
        "item": {"id": body.item_id, "item_name": format!("Item {}", body.item_id)},
    });
    state.wishlist.insert(0, row);
    Json(json!({"message": "added"})).into_response()
}

async fn get_products(State(backend): State<TestBackend>) -> Response {
    let mut state = backend.state();
    state.product_fetches += 1;
    Json(json!({"count": state.products.len(), "results": state.products.clone()})).into_response()
}

fn id_matches(id: &Value, item_id: &str) -> bool {
    match id {
        Value::String(s) => s == item_id,
        Value::Number(n) => n.to_string() == item_id,
        _ => false,
    }
}

/// Client configuration pointing at a spawned test backend.
///
/// # Panics
///
/// Panics if `base_url` is not a valid URL.
#[must_use]
#[allow(clippy::expect_used)]
pub fn config_for(base_url: &str, token: Option<&str>) -> StorefrontConfig {
    StorefrontConfig {
        api: ApiConfig {
            base_url: Url::parse(base_url).expect("Invalid test base URL"),
            request_timeout: Duration::from_secs(5),
        },
        credentials: token.map(|token| Credentials {
            user_id: UserId::new(1),
            token: SecretString::from(token.to_string()),
        }),
        cache: CacheConfig {
            capacity: 100,
            dedupe_interval: Duration::from_secs(60),
        },
        wishlist: WishlistConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}
