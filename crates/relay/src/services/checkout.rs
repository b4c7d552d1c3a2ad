//! Single-item checkout.
//!
//! Both flows validate the cart and look up the SKU's colour and image first.
//! Card checkouts become a Stripe-hosted session; crypto checkouts are payment
//! instructions addressed to the configured wallet.

use chrono::{DateTime, Utc};
use dropship_relay_core::{CurrencyCode, Price, PriceError, ProductId, SkuId};
use rust_decimal::Decimal;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::aliexpress::AffiliateClient;
use crate::config::{CryptoWalletConfig, StripeConfig};
use crate::error::{AppError, add_breadcrumb};
use crate::models::{
    CartCheckoutRequest, CheckoutItem, CheckoutSession, CheckoutValidationError, CryptoCheckout,
    SkuDetail,
};
use crate::stripe::{LineItem, NewCheckoutSession, StripeClient};

/// SKU colour and image, or an empty [`SkuDetail`] if the lookup fails.
pub async fn lookup_sku(
    client: &AffiliateClient,
    product_id: &ProductId,
    sku_id: &SkuId,
) -> SkuDetail {
    match client.sku_detail(product_id, sku_id).await {
        Ok(detail) => detail,
        Err(e) => {
            warn!(
                product_id = %product_id,
                sku_id = %sku_id,
                error = %e,
                "SKU lookup failed, continuing without colour and image"
            );
            SkuDetail::default()
        }
    }
}

/// Create a Stripe checkout session for a cart.
///
/// # Errors
///
/// Returns `AppError::InvalidCheckout` for a malformed cart and
/// `AppError::Stripe` if Stripe rejects the session.
#[instrument(skip_all, fields(product_id = %request.product_id, sku_id = %request.sku_id))]
pub async fn card_checkout(
    affiliate: &AffiliateClient,
    stripe: &StripeClient,
    config: &StripeConfig,
    request: &CartCheckoutRequest,
) -> Result<CheckoutSession, AppError> {
    request.validate()?;

    let sku = lookup_sku(affiliate, &request.product_id, &request.sku_id).await;
    let session = build_stripe_session(request, &sku, config)?;
    let created = stripe.create_checkout_session(&session).await?;

    let url = created.url.ok_or_else(|| {
        AppError::Internal(format!("Stripe session {} has no redirect URL", created.id))
    })?;

    add_breadcrumb(
        "checkout",
        "Created card checkout session",
        Some(&[
            ("product_id", request.product_id.as_str()),
            ("session_id", created.id.as_str()),
        ]),
    );

    Ok(CheckoutSession {
        session_id: created.id,
        url,
    })
}

/// Create wallet payment instructions for a cart.
///
/// # Errors
///
/// Returns `AppError::InvalidCheckout` for a malformed cart.
#[instrument(skip_all, fields(product_id = %request.product_id, sku_id = %request.sku_id))]
pub async fn crypto_checkout(
    affiliate: &AffiliateClient,
    wallet: &CryptoWalletConfig,
    currency: CurrencyCode,
    request: &CartCheckoutRequest,
) -> Result<CryptoCheckout, AppError> {
    request.validate()?;

    let sku = lookup_sku(affiliate, &request.product_id, &request.sku_id).await;
    let checkout = build_crypto_checkout(request, sku, wallet, currency, Utc::now())?;

    tracing::info!(
        reference = %checkout.reference,
        amount = %checkout.amount,
        asset = %checkout.asset,
        "Crypto checkout created"
    );

    Ok(checkout)
}

/// Build the Stripe session for a validated cart.
///
/// # Errors
///
/// Returns `CheckoutValidationError::Amount` if an amount does not fit in
/// minor units.
pub fn build_stripe_session(
    request: &CartCheckoutRequest,
    sku: &SkuDetail,
    config: &StripeConfig,
) -> Result<NewCheckoutSession, CheckoutValidationError> {
    let currency = config.currency;
    let image = sku
        .image
        .as_deref()
        .or_else(|| request.image())
        .map(str::to_string);

    let mut line_items = vec![LineItem {
        name: display_name(&request.title, sku.color.as_deref()),
        description: Some(format!("SKU {}", request.sku_id)),
        images: image.into_iter().collect(),
        unit_amount: cents(request.price, currency)?,
        quantity: request.quantity,
    }];

    if request.shipping_fee > Decimal::ZERO {
        line_items.push(LineItem {
            name: "Shipping".to_string(),
            description: None,
            images: Vec::new(),
            unit_amount: cents(request.shipping_fee, currency)?,
            quantity: 1,
        });
    }

    let sales_tax = request.sales_tax_or_zero();
    if sales_tax > Decimal::ZERO {
        line_items.push(LineItem {
            name: "Sales tax".to_string(),
            description: None,
            images: Vec::new(),
            unit_amount: cents(sales_tax, currency)?,
            quantity: 1,
        });
    }

    Ok(NewCheckoutSession {
        currency: currency.as_lowercase(),
        line_items,
        success_url: config.success_url.clone(),
        cancel_url: config.cancel_url.clone(),
        metadata: vec![
            ("product_id".to_string(), request.product_id.to_string()),
            ("sku_id".to_string(), request.sku_id.to_string()),
        ],
    })
}

/// Build the wallet payment instructions for a validated cart.
///
/// # Errors
///
/// Returns `CheckoutValidationError::Amount` if the total overflows.
pub fn build_crypto_checkout(
    request: &CartCheckoutRequest,
    sku: SkuDetail,
    wallet: &CryptoWalletConfig,
    currency: CurrencyCode,
    now: DateTime<Utc>,
) -> Result<CryptoCheckout, CheckoutValidationError> {
    let image = sku.image.or_else(|| request.image().map(str::to_string));

    Ok(CryptoCheckout {
        reference: Uuid::new_v4(),
        wallet_address: wallet.wallet_address.clone(),
        network: wallet.network.clone(),
        asset: wallet.asset.clone(),
        amount: request.total()?,
        currency,
        item: CheckoutItem {
            title: request.title.trim().to_string(),
            color: sku.color,
            image,
            quantity: request.quantity,
        },
        expires_at: now + wallet.checkout_ttl,
    })
}

fn display_name(title: &str, color: Option<&str>) -> String {
    let title = title.trim();
    match color.map(str::trim).filter(|c| !c.is_empty()) {
        Some(color) => format!("{title} - {color}"),
        None => title.to_string(),
    }
}

fn cents(amount: Decimal, currency: CurrencyCode) -> Result<i64, PriceError> {
    Price::new(amount, currency).to_minor_units()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn request() -> CartCheckoutRequest {
        serde_json::from_value(serde_json::json!({
            "title": "Phone Case",
            "price": "12.50",
            "shipping_fee": "3.00",
            "sales_tax": "1.05",
            "image": "https://img.test/client.jpg",
            "product_id": "1005",
            "sku_id": "1005-01",
            "quantity": 2
        }))
        .unwrap()
    }

    fn stripe_config() -> StripeConfig {
        StripeConfig {
            api_url: "http://stripe.test".to_string(),
            secret_key: SecretString::from("sk_test_x"),
            currency: CurrencyCode::USD,
            success_url: "https://shop.test/ok".to_string(),
            cancel_url: "https://shop.test/cancel".to_string(),
        }
    }

    fn wallet() -> CryptoWalletConfig {
        CryptoWalletConfig {
            wallet_address: "0xabc".to_string(),
            network: "ethereum".to_string(),
            asset: "USDC".to_string(),
            checkout_ttl: chrono::Duration::minutes(30),
        }
    }

    fn sku(color: Option<&str>, image: Option<&str>) -> SkuDetail {
        SkuDetail {
            color: color.map(str::to_string),
            image: image.map(str::to_string),
        }
    }

    #[test]
    fn test_stripe_session_line_items() {
        let session = build_stripe_session(
            &request(),
            &sku(Some("Red"), Some("https://img.test/red.jpg")),
            &stripe_config(),
        )
        .unwrap();

        assert_eq!(session.currency, "usd");
        assert_eq!(session.line_items.len(), 3);

        let product = &session.line_items[0];
        assert_eq!(product.name, "Phone Case - Red");
        assert_eq!(product.description.as_deref(), Some("SKU 1005-01"));
        assert_eq!(product.unit_amount, 1250);
        assert_eq!(product.quantity, 2);
        assert_eq!(product.images, vec!["https://img.test/red.jpg".to_string()]);

        assert_eq!(session.line_items[1].name, "Shipping");
        assert!(session.line_items[1].description.is_none());
        assert_eq!(session.line_items[1].unit_amount, 300);
        assert_eq!(session.line_items[2].name, "Sales tax");
        assert_eq!(session.line_items[2].unit_amount, 105);

        assert!(
            session
                .metadata
                .contains(&("sku_id".to_string(), "1005-01".to_string()))
        );
    }

    #[test]
    fn test_stripe_session_omits_zero_extras_and_falls_back_to_client_image() {
        let mut req = request();
        req.shipping_fee = Decimal::ZERO;
        req.sales_tax = None;

        let session = build_stripe_session(&req, &SkuDetail::default(), &stripe_config()).unwrap();

        assert_eq!(session.line_items.len(), 1);
        assert_eq!(session.line_items[0].name, "Phone Case");
        assert_eq!(
            session.line_items[0].images,
            vec!["https://img.test/client.jpg".to_string()]
        );
    }

    #[test]
    fn test_crypto_checkout_total_and_expiry() {
        let now = Utc::now();
        let checkout = build_crypto_checkout(
            &request(),
            sku(Some("Blue"), None),
            &wallet(),
            CurrencyCode::USD,
            now,
        )
        .unwrap();

        // 12.50 * 2 + 3.00 + 1.05
        assert_eq!(checkout.amount, "29.05".parse::<Decimal>().unwrap());
        assert_eq!(checkout.wallet_address, "0xabc");
        assert_eq!(checkout.item.color.as_deref(), Some("Blue"));
        assert_eq!(
            checkout.item.image.as_deref(),
            Some("https://img.test/client.jpg")
        );
        assert_eq!(checkout.expires_at, now + chrono::Duration::minutes(30));
    }

    #[test]
    fn test_crypto_checkout_references_are_unique() {
        let now = Utc::now();
        let build = || {
            build_crypto_checkout(&request(), SkuDetail::default(), &wallet(), CurrencyCode::USD, now)
                .unwrap()
        };
        let a = build();
        let b = build();
        assert_ne!(a.reference, b.reference);
    }

    #[test]
    fn test_crypto_checkout_rejects_overflowing_total() {
        let mut req = request();
        req.price = Decimal::MAX;
        let result = build_crypto_checkout(
            &req,
            SkuDetail::default(),
            &wallet(),
            CurrencyCode::USD,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(CheckoutValidationError::Amount(PriceError::OutOfRange))
        ));
    }

    #[test]
    fn test_display_name_ignores_blank_color() {
        assert_eq!(display_name(" Mug ", Some("  ")), "Mug");
        assert_eq!(display_name("Mug", None), "Mug");
        assert_eq!(display_name("Mug", Some("Green")), "Mug - Green");
    }
}
