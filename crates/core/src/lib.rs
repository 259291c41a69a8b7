//! Retail Core - Shared types library.
//!
//! This crate provides common types used across all retail components:
//! - `storefront` - Cart, checkout and the remote backend client
//! - `cli` - Command-line tools for migrations and cart maintenance
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, usernames, quantities, prices and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
