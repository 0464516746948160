//! Types carried in the HTTP session.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
