//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts and
//! the request/response bodies of the backend API.

pub mod auth;
pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;
pub mod wishlist;

pub use auth::{LoginRequest, LoginResponse, User};
pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Order, OrderLine, OrderPage};
pub use price::{CurrencyCode, Price};
pub use product::{Product, ProductPage, Variant};
pub use status::*;
pub use wishlist::*;
