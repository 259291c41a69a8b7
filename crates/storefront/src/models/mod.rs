//! Types the storefront keeps in the session.
//!
//! Business data (customers, products, orders) lives in the remote backend
//! and is modelled in [`crate::backend::types`].

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
