//! Product search pipeline.
//!
//! The affiliate API's category matching is loose and it filters on its own
//! (un-marked-up) prices, so category and price filtering happen here after
//! the query. Each surviving product is then enriched with a shipping quote;
//! the lookups run concurrently and a failed lookup only zeroes that item.

use dropship_relay_core::{CategoryId, Markup, ProductId, SkuId, parse_amount};
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{instrument, warn};

use crate::aliexpress::{AffiliateClient, AffiliateError, AffiliateProduct, ProductQuery};
use crate::models::{ProductSearchResult, SearchResponse, ShippingQuote, SortOrder};

/// Default number of products per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size the relay will ask the upstream for.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Validated search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub keywords: String,
    pub category_id: Option<CategoryId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: u32,
    pub page_size: u32,
    pub sort: Option<SortOrder>,
}

impl SearchParams {
    /// First page, default size, no filters.
    #[must_use]
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            category_id: None,
            min_price: None,
            max_price: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }

    fn upstream_query(&self) -> ProductQuery {
        ProductQuery {
            keywords: self.keywords.clone(),
            category_id: self.category_id.clone(),
            page: self.page,
            page_size: self.page_size,
            sort: self.sort,
        }
    }
}

/// A product that passed filtering and markup, awaiting its shipping quote.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    id: ProductId,
    sku_id: Option<SkuId>,
    title: String,
    price: Decimal,
    original_price: Option<Decimal>,
    image: Option<String>,
    category_id: Option<CategoryId>,
}

impl Candidate {
    fn into_result(self, shipping: ShippingQuote) -> ProductSearchResult {
        ProductSearchResult {
            id: self.id,
            sku_id: self.sku_id,
            title: self.title,
            price: self.price,
            original_price: self.original_price,
            image: self.image,
            category_id: self.category_id,
            shipping_fee: shipping.fee,
            min_delivery_days: shipping.min_delivery_days,
            max_delivery_days: shipping.max_delivery_days,
        }
    }
}

/// Run the full search pipeline.
///
/// # Errors
///
/// Returns an error only if the upstream product query fails. Shipping
/// lookups never fail the search.
#[instrument(skip(client, markup), fields(keywords = %params.keywords, page = params.page))]
pub async fn search(
    client: &AffiliateClient,
    markup: Markup,
    params: &SearchParams,
) -> Result<SearchResponse, AffiliateError> {
    let result = client.query_products(&params.upstream_query()).await?;

    let total_records = result.total_record_count.unwrap_or(0);
    let page = result.current_page_no.unwrap_or(params.page);
    let products = result.products.map(|list| list.product).unwrap_or_default();
    let upstream_count = products.len();

    let candidates: Vec<Candidate> = products
        .into_iter()
        .filter(|product| matches_category(product, params.category_id.as_ref()))
        .filter_map(|product| to_candidate(product, markup))
        .filter(|candidate| within_price_range(candidate.price, params.min_price, params.max_price))
        .collect();

    tracing::debug!(
        upstream = upstream_count,
        kept = candidates.len(),
        "Filtered search results"
    );

    let quotes = join_all(
        candidates
            .iter()
            .map(|candidate| shipping_for(client, candidate)),
    )
    .await;

    let products = candidates
        .into_iter()
        .zip(quotes)
        .map(|(candidate, quote)| candidate.into_result(quote))
        .collect();

    Ok(SearchResponse {
        products,
        page,
        total_records,
    })
}

async fn shipping_for(client: &AffiliateClient, candidate: &Candidate) -> ShippingQuote {
    // Nothing to quote without a SKU.
    let Some(sku_id) = &candidate.sku_id else {
        return ShippingQuote::zero();
    };
    shipping_or_zero(client, &candidate.id, sku_id, None).await
}

/// Shipping quote for a product, or [`ShippingQuote::zero`] if the lookup
/// fails.
pub async fn shipping_or_zero(
    client: &AffiliateClient,
    product_id: &ProductId,
    sku_id: &SkuId,
    ship_to_country: Option<&str>,
) -> ShippingQuote {
    match client.shipping_quote(product_id, sku_id, ship_to_country).await {
        Ok(quote) => quote,
        Err(e) => {
            warn!(
                product_id = %product_id,
                sku_id = %sku_id,
                error = %e,
                "Shipping lookup failed, using zero quote"
            );
            ShippingQuote::zero()
        }
    }
}

/// Whether `product` sits in `category` at the first or second level.
///
/// With no category requested every product matches.
fn matches_category(product: &AffiliateProduct, category: Option<&CategoryId>) -> bool {
    category.is_none_or(|wanted| {
        product.first_level_category_id.as_ref() == Some(wanted)
            || product.second_level_category_id.as_ref() == Some(wanted)
    })
}

/// Mark up a product's prices, dropping it if it is unusable.
fn to_candidate(product: AffiliateProduct, markup: Markup) -> Option<Candidate> {
    let id = product.product_id?;
    let title = product
        .product_title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())?;

    let price = match product
        .target_sale_price
        .as_deref()
        .map(|raw| parse_amount(raw).and_then(|amount| markup.apply(amount)))
    {
        Some(Ok(price)) => price,
        Some(Err(e)) => {
            warn!(product_id = %id, error = %e, "Dropping product with unusable price");
            return None;
        }
        None => {
            warn!(product_id = %id, "Dropping product without a sale price");
            return None;
        }
    };

    let original_price = product
        .target_original_price
        .as_deref()
        .and_then(|raw| parse_amount(raw).and_then(|amount| markup.apply(amount)).ok());

    let category_id = product
        .second_level_category_id
        .or(product.first_level_category_id);

    Some(Candidate {
        id,
        sku_id: product.sku_id,
        title,
        price,
        original_price,
        image: product.product_main_image_url.filter(|url| !url.is_empty()),
        category_id,
    })
}

/// Inclusive bounds check; a missing bound is open.
fn within_price_range(price: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    min.is_none_or(|min| price >= min) && max.is_none_or(|max| price <= max)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn product(id: &str, price: &str, first: Option<&str>, second: Option<&str>) -> AffiliateProduct {
        serde_json::from_value(serde_json::json!({
            "product_id": id,
            "sku_id": format!("{id}01"),
            "product_title": format!("Product {id}"),
            "target_sale_price": price,
            "target_original_price": "20.00",
            "product_main_image_url": "https://img.test/p.jpg",
            "first_level_category_id": first,
            "second_level_category_id": second,
        }))
        .unwrap()
    }

    #[test]
    fn test_matches_category_first_or_second_level() {
        let wanted = CategoryId::new("200");
        assert!(matches_category(
            &product("1", "1.00", Some("200"), Some("300")),
            Some(&wanted)
        ));
        assert!(matches_category(
            &product("2", "1.00", Some("100"), Some("200")),
            Some(&wanted)
        ));
        assert!(!matches_category(
            &product("3", "1.00", Some("100"), Some("300")),
            Some(&wanted)
        ));
        assert!(!matches_category(&product("4", "1.00", None, None), Some(&wanted)));
        assert!(matches_category(&product("5", "1.00", None, None), None));
    }

    #[test]
    fn test_to_candidate_applies_markup() {
        let markup = Markup::from_percent(Decimal::from(25)).unwrap();
        let candidate = to_candidate(product("1", "10.00", Some("1"), Some("2")), markup).unwrap();

        assert_eq!(candidate.price, dec("12.50"));
        assert_eq!(candidate.original_price, Some(dec("25.00")));
        assert_eq!(candidate.category_id, Some(CategoryId::new("2")));
        assert_eq!(candidate.sku_id, Some(SkuId::new("101")));
    }

    #[test]
    fn test_to_candidate_drops_unusable_products() {
        let markup = Markup::default();

        let mut bad_price = product("1", "abc", None, None);
        assert!(to_candidate(bad_price.clone(), markup).is_none());

        bad_price.target_sale_price = None;
        assert!(to_candidate(bad_price, markup).is_none());

        let huge_price = product("9", "79228162514264337593543950335", None, None);
        assert!(to_candidate(huge_price, Markup::from_percent(Decimal::from(25)).unwrap()).is_none());

        let mut no_id = product("2", "1.00", None, None);
        no_id.product_id = None;
        assert!(to_candidate(no_id, markup).is_none());

        let mut blank_title = product("3", "1.00", None, None);
        blank_title.product_title = Some("  ".to_string());
        assert!(to_candidate(blank_title, markup).is_none());
    }

    #[test]
    fn test_price_range_is_inclusive() {
        let price = dec("12.50");
        assert!(within_price_range(price, None, None));
        assert!(within_price_range(price, Some(dec("12.50")), Some(dec("12.50"))));
        assert!(within_price_range(price, Some(dec("10")), None));
        assert!(!within_price_range(price, Some(dec("12.51")), None));
        assert!(!within_price_range(price, None, Some(dec("12.49"))));
    }

    #[test]
    fn test_candidate_into_result_carries_shipping() {
        let candidate = to_candidate(product("7", "4.00", None, None), Markup::NONE).unwrap();
        let result = candidate.into_result(ShippingQuote {
            fee: dec("1.99"),
            min_delivery_days: 7,
            max_delivery_days: 12,
        });

        assert_eq!(result.id, ProductId::new("7"));
        assert_eq!(result.price, dec("4.00"));
        assert_eq!(result.shipping_fee, dec("1.99"));
        assert_eq!(result.max_delivery_days, 12);
    }

    #[test]
    fn test_search_params_defaults() {
        let params = SearchParams::new("phone case");
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, DEFAULT_PAGE_SIZE);

        let query = params.upstream_query();
        assert_eq!(query.keywords, "phone case");
        assert!(query.category_id.is_none());
    }
}
