//! Error types for the cart client.

use thiserror::Error;

use shopline_core::QuantityError;

/// Errors from one call to the storefront API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a 5xx status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The server rejected the request (4xx). Retrying will not help.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body was not a cart.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether a retry could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. })
    }

    /// Build from a non-success status and the server's error message.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        if status >= 500 {
            Self::Server { status, message }
        } else {
            Self::Rejected { status, message }
        }
    }
}

/// Errors reading or writing the persisted cart.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Errors surfaced by [`CartCache`](crate::CartCache) operations.
#[derive(Debug, Error)]
pub enum CartClientError {
    /// Rejected locally before any mutation was applied.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The server call failed; the local cart has been reverted.
    #[error(transparent)]
    Api(#[from] ApiError),
}
