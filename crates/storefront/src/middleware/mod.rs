//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Handlers that act on a cart take [`RequireAuth`] to get the owner.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{RequireAuth, set_current_user};
pub use request_id::{RequestId, request_id_middleware};
pub use session::{create_session_layer, session_layer, session_store};
