//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DAWA_API_BASE_URL` - Base URL of the marketplace REST backend
//!
//! ## Optional
//! - `DAWA_API_TOKEN` - Session token sent as `Authorization: Token <token>`
//! - `DAWA_USER_ID` - Numeric user id for the token (default: 0)
//! - `DAWA_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `DAWA_DEDUPE_INTERVAL_MS` - Window in which a settled key is served
//!   without refetching (default: 2000)
//! - `DAWA_CACHE_CAPACITY` - Maximum tracked freshness markers (default: 1000)
//! - `DAWA_REVALIDATE_ON_SUCCESS` - Refetch the wishlist after a successful
//!   toggle (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use dawa_core::UserId;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DEDUPE_INTERVAL_MS: u64 = 2000;
const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// REST backend configuration
    pub api: ApiConfig,
    /// Credentials for the signed-in user, if any
    pub credentials: Option<Credentials>,
    /// Mutation cache tuning
    pub cache: CacheConfig,
    /// Wishlist store behavior
    pub wishlist: WishlistConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// REST backend configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, always ending in `/` so endpoint paths join beneath it
    pub base_url: Url,
    /// Timeout applied to every request
    pub request_timeout: Duration,
}

/// Token credentials for an authenticated session.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct Credentials {
    pub user_id: UserId,
    pub token: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Mutation cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of keys tracked as fresh
    pub capacity: u64,
    /// How long a settled key is served by `get_or_fetch` without refetching
    pub dedupe_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            dedupe_interval: Duration::from_millis(DEFAULT_DEDUPE_INTERVAL_MS),
        }
    }
}

/// Wishlist store behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WishlistConfig {
    /// Refetch the wishlist after every successful toggle. When disabled the
    /// optimistic state is kept as-is after the backend confirms.
    pub revalidate_on_success: bool,
}

impl Default for WishlistConfig {
    fn default() -> Self {
        Self {
            revalidate_on_success: true,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = ApiConfig {
            base_url: parse_base_url(&get_required_env("DAWA_API_BASE_URL")?)
                .map_err(|e| ConfigError::InvalidEnvVar("DAWA_API_BASE_URL".to_string(), e))?,
            request_timeout: Duration::from_secs(get_parsed_or_default(
                "DAWA_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        };

        let credentials = match get_optional_env("DAWA_API_TOKEN") {
            Some(token) if !token.trim().is_empty() => Some(Credentials {
                user_id: UserId::new(get_parsed_or_default("DAWA_USER_ID", 0)?),
                token: SecretString::from(token),
            }),
            _ => None,
        };

        let cache = CacheConfig {
            capacity: get_parsed_or_default("DAWA_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?,
            dedupe_interval: Duration::from_millis(get_parsed_or_default(
                "DAWA_DEDUPE_INTERVAL_MS",
                DEFAULT_DEDUPE_INTERVAL_MS,
            )?),
        };

        let wishlist = WishlistConfig {
            revalidate_on_success: get_optional_env("DAWA_REVALIDATE_ON_SUCCESS")
                .map(|raw| {
                    parse_bool(&raw).ok_or_else(|| {
                        ConfigError::InvalidEnvVar(
                            "DAWA_REVALIDATE_ON_SUCCESS".to_string(),
                            format!("expected a boolean, got '{raw}'"),
                        )
                    })
                })
                .transpose()?
                .unwrap_or(true),
        };

        Ok(Self {
            api,
            credentials,
            cache,
            wishlist,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable parsed as `T`, or `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse the backend base URL, forcing a trailing slash.
///
/// `Url::join` replaces the last path segment unless the base ends in `/`,
/// so `https://host/api` would otherwise lose its `api` segment.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
