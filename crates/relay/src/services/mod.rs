//! Business logic services for the relay.
//!
//! # Services
//!
//! - `catalog` - Search pipeline (query, filter, markup, shipping enrichment)
//! - `checkout` - Card (Stripe) and crypto-wallet checkouts for a single item

pub mod catalog;
pub mod checkout;
