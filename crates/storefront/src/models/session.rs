//! Session-related types.
//!
//! Identity is established by the external authentication service, which
//! writes [`CurrentUser`] into the shared session store. The storefront only
//! reads it.

use serde::{Deserialize, Serialize};

use shopline_core::UserId;

/// Session-stored user identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's ID as issued by the authentication service.
    pub id: UserId,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
