//! Dropship relay library.
//!
//! Wraps an affiliate catalog API (search, shipping, SKU detail) and a
//! payment provider behind a small JSON API for a storefront frontend.
//! Exposed as a library so the CLI and the integration tests can drive the
//! same code the server runs.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod aliexpress;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;

pub use app::build_router;
