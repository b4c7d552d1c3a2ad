//! Request and response DTOs for the relay API.
//!
//! None of these are persisted. They are built per request from upstream
//! data or client input and dropped once the response is written.

pub mod catalog;
pub mod checkout;

pub use catalog::{ProductSearchResult, SearchResponse, ShippingQuote, SkuDetail, SortOrder};
pub use checkout::{
    CartCheckoutRequest, CheckoutItem, CheckoutSession, CheckoutValidationError, CryptoCheckout,
    MAX_QUANTITY,
};
