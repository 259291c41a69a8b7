//! Retail storefront library.
//!
//! Keeps each user's cart locally, talks to the remote retail backend for
//! customers, products, orders and uploads, and turns a cart into orders at
//! checkout.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
