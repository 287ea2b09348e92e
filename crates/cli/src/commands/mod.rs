//! Command implementations.
//!
//! Each submodule maps one group of `shop-cli` subcommands onto the client
//! library. Commands print human readable output to stdout and return
//! [`CliError`] on failure.

pub mod auth;
pub mod catalog;
pub mod wishlist;

use shopfront_client::{
    ApiClient, ApiError, ClientConfig, ConfigError, FileTokenStore, Session, WishlistCoordinator,
};
use shopfront_core::EmailError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend request failed.
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),

    /// Email address did not validate.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// `login` was run without a password.
    #[error("Password required: pass --password or set SHOPFRONT_PASSWORD")]
    MissingPassword,

    /// A wishlist operation was refused or failed.
    #[error("{0}")]
    Wishlist(String),
}

/// Everything a command needs to talk to the backend.
pub struct Context {
    pub config: ClientConfig,
    pub client: ApiClient,
    pub wishlist: WishlistCoordinator,
}

impl Context {
    /// Build the client stack from `config`, restoring any saved token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, CliError> {
        let session = Session::new(FileTokenStore::new(&config.token_path));
        let client = ApiClient::new(&config, session)?;
        let wishlist = WishlistCoordinator::from_client(&client, config.wishlist);
        wishlist.watch_session();

        Ok(Self {
            config,
            client,
            wishlist,
        })
    }

    /// Page size to use when none was given on the command line.
    pub fn page_size(&self, limit: Option<u32>) -> u32 {
        limit.filter(|&l| l > 0).unwrap_or(self.config.page_size)
    }

    /// Turn a failed coordinator call into an error carrying its notice.
    pub fn wishlist_failure(&self, fallback: &str) -> CliError {
        CliError::Wishlist(
            self.wishlist
                .notice()
                .unwrap_or_else(|| fallback.to_string()),
        )
    }
}
