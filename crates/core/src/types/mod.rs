//! Core types for Dropship Relay.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;

pub use id::*;
pub use price::{CurrencyCode, Markup, Price, PriceError, ensure_non_negative, parse_amount};
