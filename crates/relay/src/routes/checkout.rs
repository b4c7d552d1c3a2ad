//! Checkout route handlers.
//!
//! Both handlers take the JSON body as a `Result` so malformed carts get the
//! same JSON 400 as carts that fail validation.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::models::{CartCheckoutRequest, CheckoutSession, CryptoCheckout};
use crate::services::checkout;
use crate::state::AppState;

/// Start a card checkout and return the Stripe redirect.
#[instrument(skip(state, payload))]
pub async fn card(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CartCheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutSession>> {
    let Json(request) = payload?;
    let session = checkout::card_checkout(
        state.affiliate(),
        state.stripe(),
        &state.config().stripe,
        &request,
    )
    .await?;
    Ok(Json(session))
}

/// Start a crypto-wallet checkout.
///
/// Returns 503 when no wallet is configured.
#[instrument(skip(state, payload))]
pub async fn crypto(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CartCheckoutRequest>, JsonRejection>,
) -> Result<Json<CryptoCheckout>> {
    let Json(request) = payload?;
    let config = state.config();
    let wallet = config
        .crypto
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("crypto checkout is not configured".to_string()))?;

    let checkout = checkout::crypto_checkout(
        state.affiliate(),
        wallet,
        config.aliexpress.target_currency,
        &request,
    )
    .await?;
    Ok(Json(checkout))
}
