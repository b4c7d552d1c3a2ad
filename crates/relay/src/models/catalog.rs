//! Catalog DTOs returned by the search and lookup endpoints.

use dropship_relay_core::{CategoryId, ProductId, SkuId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One product in a search response.
///
/// `price` already carries the configured markup; `original_price` is the
/// upstream list price with the same markup, when the upstream sent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSearchResult {
    pub id: ProductId,
    pub sku_id: Option<SkuId>,
    pub title: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub image: Option<String>,
    pub category_id: Option<CategoryId>,
    pub shipping_fee: Decimal,
    pub min_delivery_days: u32,
    pub max_delivery_days: u32,
}

/// A page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub products: Vec<ProductSearchResult>,
    pub page: u32,
    /// Total upstream matches, before local filtering.
    pub total_records: u64,
}

/// Colour and image for a single SKU.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuDetail {
    pub color: Option<String>,
    pub image: Option<String>,
}

/// Shipping fee and delivery window for a product/SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub fee: Decimal,
    pub min_delivery_days: u32,
    pub max_delivery_days: u32,
}

impl ShippingQuote {
    /// Fallback used when the shipping lookup fails.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            fee: Decimal::ZERO,
            min_delivery_days: 0,
            max_delivery_days: 0,
        }
    }
}

/// Sort order for product search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    PriceAsc,
    PriceDesc,
    VolumeAsc,
    VolumeDesc,
}

impl SortOrder {
    /// The value the affiliate API expects in its `sort` parameter.
    #[must_use]
    pub const fn as_upstream(self) -> &'static str {
        match self {
            Self::PriceAsc => "SALE_PRICE_ASC",
            Self::PriceDesc => "SALE_PRICE_DESC",
            Self::VolumeAsc => "LAST_VOLUME_ASC",
            Self::VolumeDesc => "LAST_VOLUME_DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "volume_asc" => Ok(Self::VolumeAsc),
            "volume_desc" => Ok(Self::VolumeDesc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}
