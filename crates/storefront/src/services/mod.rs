//! Business logic services for the storefront.
//!
//! # Services
//!
//! - [`cart`] - Add, update, remove and view cart lines
//! - [`checkout`] - Turn a cart into backend orders

pub mod cart;
pub mod checkout;

pub use cart::{CartError, CartService, CartView, CartViewLine};
pub use checkout::{
    CheckoutError, CheckoutResult, CheckoutService, CheckoutStatus, LineDisposition, LineError,
    LineErrorKind, OrderOutcome,
};
