//! Dawa Storefront library.
//!
//! Client-side data layer of the Dawa marketplace: everything between the
//! REST backend and the view layer that renders normalized data.
//!
//! # Modules
//!
//! - [`api`] - HTTP client for the backend endpoints
//! - [`cache`] - Keyed mutation cache with optimistic writes and latest-wins fetches
//! - [`session`] - Current-identity gate
//! - [`wishlist`] - Optimistic wishlist store built on the cache
//! - [`state`] - Application context wiring the above together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod wishlist;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheStatus, MutationCache, Snapshot};
pub use config::StorefrontConfig;
pub use error::{Result, StorefrontError};
pub use session::{Identity, IdentityProvider, SessionGate};
pub use state::AppContext;
pub use wishlist::{WishlistBackend, WishlistEvent, WishlistObserver, WishlistStore};
