//! Wire types for affiliate API responses.
//!
//! The gateway wraps every payload in `<method>_response.resp_result`, and is
//! loose with types: numbers show up as strings and vice versa, and most
//! fields can be missing. Everything here is `Option` and lenient; the
//! services layer decides what is usable.

use dropship_relay_core::{CategoryId, ProductId, SkuId};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// The `resp_result` object inside a method envelope.
#[derive(Debug, Deserialize)]
pub struct RespResult<T> {
    pub resp_code: Option<i64>,
    pub resp_msg: Option<String>,
    pub result: Option<T>,
}

/// Gateway-level error envelope (`error_response`).
#[derive(Debug, Deserialize)]
pub struct GatewayError {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    pub msg: Option<String>,
    pub request_id: Option<String>,
}

// =============================================================================
// aliexpress.affiliate.product.query
// =============================================================================

/// Result of a product query.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQueryResult {
    pub current_page_no: Option<u32>,
    pub current_record_count: Option<u32>,
    pub total_record_count: Option<u64>,
    pub products: Option<ProductList>,
}

/// The `products` wrapper object.
#[derive(Debug, Default, Deserialize)]
pub struct ProductList {
    #[serde(default)]
    pub product: Vec<AffiliateProduct>,
}

/// One product as returned by the query endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AffiliateProduct {
    pub product_id: Option<ProductId>,
    pub sku_id: Option<SkuId>,
    pub product_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub target_sale_price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub target_original_price: Option<String>,
    pub target_sale_price_currency: Option<String>,
    pub product_main_image_url: Option<String>,
    pub first_level_category_id: Option<CategoryId>,
    pub second_level_category_id: Option<CategoryId>,
    pub promotion_link: Option<String>,
}

// =============================================================================
// aliexpress.affiliate.product.shipping.get
// =============================================================================

/// Shipping estimate for one product/SKU.
#[derive(Debug, Default, Deserialize)]
pub struct ShippingResult {
    pub shipping_fee: Option<Decimal>,
    pub shipping_fee_currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub min_delivery_days: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_delivery_days: Option<u32>,
}

// =============================================================================
// aliexpress.affiliate.product.sku.detail.get
// =============================================================================

/// SKU listing for a product.
#[derive(Debug, Default, Deserialize)]
pub struct SkuDetailResult {
    #[serde(default)]
    pub traffic_sku_info_list: Vec<SkuInfo>,
}

/// One SKU entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SkuInfo {
    pub sku_id: Option<SkuId>,
    pub color: Option<String>,
    pub sku_image_link: Option<String>,
    /// Raw property string, e.g. `"Color:Red;Size:M"`.
    pub sku_properties: Option<String>,
}

impl SkuInfo {
    /// The SKU colour, from the dedicated field or the property string.
    #[must_use]
    pub fn color(&self) -> Option<String> {
        non_blank(self.color.as_deref()).or_else(|| {
            self.sku_properties.as_deref().and_then(|props| {
                props.split(';').find_map(|pair| {
                    let (name, value) = pair.split_once(':')?;
                    name.trim()
                        .eq_ignore_ascii_case("color")
                        .then(|| non_blank(Some(value)))
                        .flatten()
                })
            })
        })
    }

    /// The SKU image, if present.
    #[must_use]
    pub fn image(&self) -> Option<String> {
        non_blank(self.sku_image_link.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

// =============================================================================
// Lenient deserializers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
            Scalar::String(s) => s,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
        }),
    )
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Scalar>::deserialize(deserializer)?.and_then(|scalar| match scalar {
            Scalar::String(s) => s.trim().parse().ok(),
            Scalar::Unsigned(n) => u32::try_from(n).ok(),
            Scalar::Signed(n) => u32::try_from(n).ok(),
            Scalar::Float(_) => None,
        }),
    )
}
