//! Shopfront Core - Shared types library.
//!
//! This crate provides common types used across all Shopfront components:
//! - `client` - REST client, session handling and the wishlist coordinator
//! - `cli` - Command-line front end for shoppers
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. The JSON
//! shapes of the backend REST endpoints live here so the client and the
//! test mock backend agree on one definition.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, order statuses and wire types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
