//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart Store operations with validation and priced views
//! - `checkout` - The all-or-nothing checkout transaction
//! - `orders` - Order lookup with ownership checks
//! - `catalog` - Read-through category cache

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
