//! Dropship Relay Core - Shared types library.
//!
//! This crate provides common types used across all Dropship Relay components:
//! - `relay` - The HTTP relay in front of the affiliate catalog and payment providers
//! - `cli` - Operator tooling (request signing, pipeline dry runs)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for catalog identifiers and decimal prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
