//! Dawa REST backend client.
//!
//! # Architecture
//!
//! - Plain HTTP + JSON over `reqwest`
//! - The backend is the source of truth; caching lives in [`crate::cache`]
//! - Token authentication: requests carry `Authorization: Token <token>`
//!   whenever a session token is supplied
//!
//! # Endpoints
//!
//! - `GET getuserwishlist/` returns `{"wishlist": [...]}`
//! - `POST wishunwish/` with `{"item_id": "..."}` flips membership
//! - Any other catalog endpoint through [`ApiClient::get_json`]

use std::sync::Arc;

use dawa_core::{Product, ProductId, normalize_products};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ApiConfig;
use crate::wishlist::WishlistBackend;

/// Wishlist listing endpoint.
pub const WISHLIST_PATH: &str = "getuserwishlist/";
/// Wishlist membership toggle endpoint.
pub const WISH_UNWISH_PATH: &str = "wishunwish/";

/// How much of an error body is kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 200;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Token missing, expired, or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Request body for the wish/unwish toggle.
#[derive(Debug, Serialize)]
struct WishUnwishRequest<'a> {
    item_id: &'a str,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Dawa REST backend.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Base URL all endpoint paths are joined onto.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// GET a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend answers with a
    /// non-success status, or the body is not JSON.
    #[instrument(skip(self, token), fields(path = %path))]
    pub async fn get_json(
        &self,
        path: &str,
        token: Option<&SecretString>,
    ) -> Result<Value, ApiError> {
        let request = self.inner.client.get(self.endpoint(path)?);
        self.execute(authorize(request, token)).await
    }

    /// POST a JSON body and return the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend answers with a
    /// non-success status, or the body is not JSON.
    #[instrument(skip(self, body, token), fields(path = %path))]
    pub async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        token: Option<&SecretString>,
    ) -> Result<Value, ApiError> {
        let request = self.inner.client.post(self.endpoint(path)?).json(body);
        self.execute(authorize(request, token)).await
    }

    /// Send a request and decode its JSON body.
    ///
    /// An empty body decodes to `Value::Null`.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }
}

impl WishlistBackend for ApiClient {
    #[instrument(skip_all)]
    async fn fetch_wishlist(&self, token: &SecretString) -> Result<Vec<Product>, ApiError> {
        let payload = self.get_json(WISHLIST_PATH, Some(token)).await?;
        let items = normalize_products(&payload, "wishlist");
        debug!(count = items.len(), "Fetched wishlist");
        Ok(items)
    }

    #[instrument(skip(self, token), fields(item_id = %item_id))]
    async fn toggle_item(&self, token: &SecretString, item_id: &ProductId) -> Result<(), ApiError> {
        let body = WishUnwishRequest {
            item_id: item_id.as_str(),
        };
        self.post_json(WISH_UNWISH_PATH, &body, Some(token)).await?;
        Ok(())
    }
}

/// Attach `Authorization: Token <token>` when a token is present.
fn authorize(
    request: reqwest::RequestBuilder,
    token: Option<&SecretString>,
) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.header(AUTHORIZATION, format!("Token {}", token.expose_secret())),
        None => request,
    }
}
