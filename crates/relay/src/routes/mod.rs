//! HTTP route handlers for the relay.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                   - Health check
//!
//! # Catalog (api rate limit)
//! GET  /api/products/search                      - Search pipeline
//! GET  /api/products/{product_id}/skus/{sku_id}  - SKU colour and image
//! GET  /api/products/{product_id}/shipping       - Shipping quote (?sku_id, ?country)
//!
//! # Checkout (strict rate limit)
//! POST /api/checkout/card                        - Stripe checkout session
//! POST /api/checkout/crypto                      - Crypto-wallet checkout
//! ```

pub mod checkout;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(products::search))
        .route("/{product_id}/skus/{sku_id}", get(products::sku_detail))
        .route("/{product_id}/shipping", get(products::shipping))
        .layer(api_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/card", post(checkout::card))
        .route("/crypto", post(checkout::crypto))
        .layer(checkout_rate_limiter())
}

/// Create all API routes for the relay.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/products", product_routes())
        .nest("/api/checkout", checkout_routes())
}
