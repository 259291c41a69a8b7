//! Core types for the retail storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod quantity;
pub mod status;
pub mod username;

pub use id::*;
pub use price::Price;
pub use quantity::{Quantity, QuantityError};
pub use status::OrderStatus;
pub use username::{Username, UsernameError};
