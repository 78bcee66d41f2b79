//! Application context shared by every consumer.
//!
//! Built once at startup and passed by handle; there is no global cache.
//! Every consumer shares one [`MutationCache`], so the wishlist list under
//! [`WISHLIST_KEY`](crate::wishlist::WISHLIST_KEY) is visible to anything
//! subscribed to the context's cache.

use std::sync::Arc;

use dawa_core::{Product, normalize_products};
use tracing::instrument;

use crate::api::{ApiClient, ApiError};
use crate::cache::MutationCache;
use crate::config::StorefrontConfig;
use crate::error::StorefrontError;
use crate::session::{Identity, IdentityProvider, SessionGate};
use crate::wishlist::WishlistStore;

/// Application context shared across all consumers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// API client, session, shared cache, and the wishlist store.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppContextInner>,
}

struct AppContextInner {
    config: StorefrontConfig,
    api: ApiClient,
    session: SessionGate,
    cache: MutationCache<Vec<Product>>,
    wishlist: WishlistStore<ApiClient>,
}

impl AppContext {
    /// Create the application context.
    ///
    /// Signs in immediately when the configuration carries credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StorefrontError> {
        let api = ApiClient::new(&config.api)?;
        let session = SessionGate::new();
        if let Some(credentials) = config.credentials.clone() {
            session.sign_in(Identity::from(credentials));
        }

        let cache = MutationCache::new(&config.cache);
        let wishlist = WishlistStore::new(
            api.clone(),
            Arc::new(session.clone()),
            cache.clone(),
            config.wishlist,
        );

        Ok(Self {
            inner: Arc::new(AppContextInner {
                config,
                api,
                session,
                cache,
                wishlist,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the session gate.
    #[must_use]
    pub fn session(&self) -> &SessionGate {
        &self.inner.session
    }

    /// Get a reference to the shared product cache.
    #[must_use]
    pub fn cache(&self) -> &MutationCache<Vec<Product>> {
        &self.inner.cache
    }

    /// Get a reference to the wishlist store.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore<ApiClient> {
        &self.inner.wishlist
    }

    /// Start a session.
    pub fn sign_in(&self, identity: Identity) {
        self.inner.wishlist.reset();
        self.inner.session.sign_in(identity);
    }

    /// End the session and drop everything cached for the user.
    pub fn sign_out(&self) {
        self.inner.session.sign_out();
        self.inner.wishlist.reset();
        self.inner.cache.invalidate_all();
    }

    /// Fetch a product listing through the shared cache.
    ///
    /// `path` doubles as the cache key; `field` names the array inside the
    /// response object (a bare array response is accepted too).
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch was needed and failed.
    #[instrument(skip(self))]
    pub async fn products(&self, path: &str, field: &str) -> Result<Vec<Product>, ApiError> {
        let token = self.inner.session.current_user().map(|identity| identity.token);
        let api = self.inner.api.clone();
        let owned_path = path.to_string();
        let owned_field = field.to_string();

        self.inner
            .cache
            .get_or_fetch(path, move || async move {
                let payload = api.get_json(&owned_path, token.as_ref()).await?;
                Ok::<_, ApiError>(normalize_products(&payload, &owned_field))
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use dawa_core::{ProductId, UserId};
    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::config::{ApiConfig, CacheConfig, Credentials, WishlistConfig};
    use crate::wishlist::WISHLIST_KEY;

    fn signed_in_config() -> StorefrontConfig {
        StorefrontConfig {
            api: ApiConfig {
                base_url: Url::parse("http://127.0.0.1:9/api/").unwrap(),
                request_timeout: Duration::from_secs(1),
            },
            credentials: Some(Credentials {
                user_id: UserId::new(1),
                token: SecretString::from("token".to_string()),
            }),
            cache: CacheConfig::default(),
            wishlist: WishlistConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[tokio::test]
    async fn test_wishlist_publishes_into_shared_cache() {
        let ctx = AppContext::new(signed_in_config()).unwrap();
        let mut rx = ctx.cache().subscribe(WISHLIST_KEY);

        let _settle = ctx.wishlist().toggle(ProductId::from("5"), None);

        assert!(rx.has_changed().unwrap());
        let items = ctx.cache().data(WISHLIST_KEY).unwrap();
        assert_eq!(
            items.first().map(|item| item.id.clone()),
            Some(ProductId::from("5"))
        );
        assert_eq!(rx.borrow_and_update().data.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_sign_out_clears_shared_cache() {
        let ctx = AppContext::new(signed_in_config()).unwrap();
        let _settle = ctx.wishlist().toggle(ProductId::from("5"), None);
        ctx.cache().set("products/", vec![Product::default()]);

        ctx.sign_out();

        assert!(!ctx.session().is_signed_in());
        assert!(ctx.cache().data(WISHLIST_KEY).is_none());
        assert!(ctx.cache().data("products/").is_none());
        assert_eq!(ctx.wishlist().count(), 0);
    }
}
