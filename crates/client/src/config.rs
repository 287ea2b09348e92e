//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the backend REST API
//!
//! ## Optional
//! - `SHOPFRONT_TOKEN_PATH` - Where the bearer token is persisted (default: .shopfront/token)
//! - `SHOPFRONT_WISHLIST_DEBOUNCE_MS` - Wishlist status batch window (default: 100)
//! - `SHOPFRONT_NOTICE_TTL_SECS` - How long error notices stay visible (default: 5)
//! - `SHOPFRONT_PAGE_SIZE` - Default page size for paged lists (default: 12)
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::wishlist::WishlistSettings;

const DEFAULT_TOKEN_PATH: &str = ".shopfront/token";
const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_NOTICE_TTL_SECS: u64 = 5;
const DEFAULT_PAGE_SIZE: u32 = 12;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Shopfront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend REST API
    pub api_url: Url,
    /// File the bearer token is persisted to
    pub token_path: PathBuf,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Default page size for wishlist, product and order listings
    pub page_size: u32,
    /// Wishlist coordinator timing
    pub wishlist: WishlistSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
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

        let api_url = parse_api_url(&get_required_env("SHOPFRONT_API_URL")?)?;
        let token_path = PathBuf::from(get_env_or_default(
            "SHOPFRONT_TOKEN_PATH",
            DEFAULT_TOKEN_PATH,
        ));
        let debounce_ms = get_parsed_env("SHOPFRONT_WISHLIST_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?;
        let notice_ttl_secs = get_parsed_env("SHOPFRONT_NOTICE_TTL_SECS", DEFAULT_NOTICE_TTL_SECS)?;
        let page_size = get_parsed_env("SHOPFRONT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_PAGE_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let timeout_secs = get_parsed_env(
            "SHOPFRONT_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_url,
            token_path,
            request_timeout: Duration::from_secs(timeout_secs),
            page_size,
            wishlist: WishlistSettings {
                debounce: Duration::from_millis(debounce_ms),
                notice_ttl: Duration::from_secs(notice_ttl_secs),
            },
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for a backend at `api_url` with every other value at its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn for_api_url(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            wishlist: WishlistSettings::default(),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, forcing a trailing slash so relative joins keep the path prefix.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "SHOPFRONT_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable parsed into `T`, falling back to `default` when unset.
fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
