//! Shopfront client library.
//!
//! Talks to the Shopfront REST backend on behalf of a shopper:
//!
//! - [`api`] - `reqwest` client for auth, catalog, orders and wishlist endpoints
//! - [`session`] - Bearer token state and sign-in/sign-out events
//! - [`token`] - Token persistence (file or memory)
//! - [`wishlist`] - Batched, cache-backed wishlist status coordinator
//! - [`config`] - Environment-driven configuration
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env()?;
//! let session = Session::new(FileTokenStore::new(&config.token_path));
//! let client = ApiClient::new(&config, session)?;
//!
//! let wishlist = WishlistCoordinator::from_client(&client, config.wishlist);
//! wishlist.watch_session();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod token;
pub mod wishlist;

pub use api::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use session::{Session, SessionEvent};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
pub use wishlist::{WishlistApi, WishlistCoordinator, WishlistSettings};
