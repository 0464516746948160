//! Shopline Core - Shared domain types and checkout rules.
//!
//! This crate provides the data model used by every Shopline component:
//! - `storefront` - Cart store, checkout transaction, and JSON API
//! - `cart-client` - Client-side cart cache with optimistic updates
//! - `cli` - Command-line tools for migrations, seeding, and restocking
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The checkout validation rules (total computation and
//! stock shortage detection) live here so that they can be tested without storage.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, quantities, addresses, and statuses
//! - [`catalog`] - Products and categories
//! - [`cart`] - Cart lines and the priced cart view
//! - [`order`] - Orders and order lines
//! - [`checkout`] - Snapshot validation and order drafts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod order;
pub mod types;

pub use types::*;
