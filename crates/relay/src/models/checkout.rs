//! Checkout request and response DTOs.

use chrono::{DateTime, Utc};
use dropship_relay_core::{
    CurrencyCode, IdError, Price, PriceError, ProductId, SkuId, ensure_non_negative,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on the quantity of a single checkout.
pub const MAX_QUANTITY: u32 = 99;

/// Reasons a client-supplied checkout request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error(transparent)]
    Amount(#[from] PriceError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("quantity must be between 1 and {MAX_QUANTITY} (got {0})")]
    Quantity(u32),
}

/// A single-item cart sent by the storefront.
///
/// Field names are snake_case; the camelCase spellings the storefront
/// bundle uses are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCheckoutRequest {
    pub title: String,
    pub price: Decimal,
    #[serde(alias = "shippingFee")]
    pub shipping_fee: Decimal,
    #[serde(default, alias = "salesTax")]
    pub sales_tax: Option<Decimal>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(alias = "productId")]
    pub product_id: ProductId,
    #[serde(alias = "skuId")]
    pub sku_id: SkuId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

impl CartCheckoutRequest {
    /// Check the invariants the rest of the checkout relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), CheckoutValidationError> {
        if self.title.trim().is_empty() {
            return Err(CheckoutValidationError::EmptyTitle);
        }
        ensure_non_negative("price", self.price)?;
        ensure_non_negative("shipping_fee", self.shipping_fee)?;
        if let Some(tax) = self.sales_tax {
            ensure_non_negative("sales_tax", tax)?;
        }
        if !(1..=MAX_QUANTITY).contains(&self.quantity) {
            return Err(CheckoutValidationError::Quantity(self.quantity));
        }
        ProductId::parse(self.product_id.as_str())?;
        SkuId::parse(self.sku_id.as_str())?;
        // Every line item is bounded by the total, so this covers them too.
        Price::new(self.total()?, CurrencyCode::default()).to_minor_units()?;
        Ok(())
    }

    /// Sales tax, treating a missing value as zero.
    #[must_use]
    pub fn sales_tax_or_zero(&self) -> Decimal {
        self.sales_tax.unwrap_or(Decimal::ZERO)
    }

    /// `price * quantity + shipping_fee + sales_tax`.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::OutOfRange` if the sum overflows.
    pub fn total(&self) -> Result<Decimal, PriceError> {
        self.price
            .checked_mul(Decimal::from(self.quantity))
            .and_then(|subtotal| subtotal.checked_add(self.shipping_fee))
            .and_then(|subtotal| subtotal.checked_add(self.sales_tax_or_zero()))
            .ok_or(PriceError::OutOfRange)
    }

    /// The client image, unless blank.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// A Stripe-hosted checkout page the client should redirect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// What is being paid for, as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub title: String,
    pub color: Option<String>,
    pub image: Option<String>,
    pub quantity: u32,
}

/// Instructions for paying a cart from a crypto wallet.
///
/// The relay does not watch the chain; `reference` is what the shopper (and
/// whoever reconciles payments) uses to match a transfer to this checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoCheckout {
    pub reference: Uuid,
    pub wallet_address: String,
    pub network: String,
    pub asset: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub item: CheckoutItem,
    pub expires_at: DateTime<Utc>,
}
