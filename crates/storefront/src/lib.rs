//! Shopline Storefront library.
//!
//! Cart store, checkout transaction, order history and category cache behind
//! an axum JSON API. The binary in `main.rs` wires these to `PostgreSQL`; the
//! integration tests run the same code against [`db::MemoryStore`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
