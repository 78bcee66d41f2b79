//! Top-level error type for the storefront library.
//!
//! Wishlist mutations never surface errors (they roll back instead); this
//! type covers startup and explicit fetches.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// An operation needed a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,
}

impl StorefrontError {
    /// Returns true for failures worth reporting to error tracking.
    ///
    /// Missing configuration and missing sign-in are operator or user
    /// mistakes; backend failures other than auth are not.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::Api(
                ApiError::Http(_)
                    | ApiError::Parse(_)
                    | ApiError::Url(_)
                    | ApiError::Status { .. }
            )
        )
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;
