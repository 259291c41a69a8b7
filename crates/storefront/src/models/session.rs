//! Session-related types.
//!
//! The login flow is outside this crate; it writes a [`CurrentUser`] under
//! [`keys::CURRENT_USER`] and everything here only reads it.

use serde::{Deserialize, Serialize};

use retail_core::Username;

/// Session-stored user identity.
///
/// The username is the cart owner and is matched against backend customers
/// at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Login name.
    pub username: Username,
    /// Role claim from the login flow, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl CurrentUser {
    /// A user without a role claim.
    #[must_use]
    pub const fn new(username: Username) -> Self {
        Self {
            username,
            role: None,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
