//! Backend REST API client.
//!
//! Uses `reqwest` for HTTP and keeps the bearer token in the shared
//! [`Session`]. Every request carries an `x-request-id` so backend logs can
//! be correlated with client logs. Any `401` on an authenticated request signs
//! the session out, which broadcasts `LoggedOut` to everything holding
//! user-scoped state.
//!
//! Products are cached using `moka` (5-minute TTL).

mod auth;
mod cache;
mod catalog;
mod wishlist;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ApiError, extract_server_message};
use crate::session::Session;

use cache::{CacheKey, CacheValue};

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// How a request uses the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    /// Fail with [`ApiError::Unauthenticated`] when no token is held.
    Required,
    /// Attach the token when present.
    Optional,
    /// Never attach the token; a 401 does not end the session (sign-in).
    Anonymous,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront backend.
///
/// Cheaply cloneable; clones share the HTTP connection pool, the session and
/// the product cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, session: Session) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("shopfront-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.api_url.clone(),
                session,
                cache,
            }),
        })
    }

    /// The session whose token this client sends.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve `path` against the base URL and append `query`.
    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Build a request for `path` (relative to the base URL).
    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        auth: AuthMode,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path, query)?;
        let mut builder = self
            .inner
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());

        match (auth, self.inner.session.token()) {
            (AuthMode::Anonymous, _) | (AuthMode::Optional, None) => {}
            (AuthMode::Required | AuthMode::Optional, Some(token)) => {
                builder = builder.bearer_auth(token.expose_secret());
            }
            (AuthMode::Required, None) => return Err(ApiError::Unauthenticated),
        }

        Ok(builder)
    }

    /// Send a request and decode a JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        auth: AuthMode,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();

        if status == StatusCode::UNAUTHORIZED && auth != AuthMode::Anonymous {
            warn!(path = %url, "Backend rejected token, signing out");
            self.inner.session.sign_out();
            return Err(ApiError::Unauthorized);
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url));
        }

        if !status.is_success() {
            let message = extract_server_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });
            debug!(
                status = %status,
                path = %url,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                path = %url,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    /// Shorthand for an authenticated request without a body.
    async fn authed<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ApiError> {
        let builder = self.request(method, path, &[], AuthMode::Required)?;
        self.send(builder, AuthMode::Required).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}
