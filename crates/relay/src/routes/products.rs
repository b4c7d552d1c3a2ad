//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use dropship_relay_core::{CategoryId, ProductId, SkuId, parse_amount};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::models::{SearchResponse, ShippingQuote, SkuDetail, SortOrder};
use crate::services::catalog::{self, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, SearchParams};
use crate::services::checkout::lookup_sku;
use crate::state::AppState;

/// Raw search query parameters.
///
/// Everything except `keywords` arrives as text so malformed values become a
/// JSON 400 rather than a plain-text extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub keywords: Option<String>,
    pub category_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

impl TryFrom<SearchQuery> for SearchParams {
    type Error = AppError;

    fn try_from(query: SearchQuery) -> std::result::Result<Self, Self::Error> {
        let keywords = query
            .keywords
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::BadRequest("keywords must not be empty".to_string()))?
            .to_string();

        let category_id = non_blank(query.category_id.as_deref())
            .map(|raw| CategoryId::parse(raw).map_err(|e| AppError::BadRequest(e.to_string())))
            .transpose()?;

        let min_price = parse_price("min_price", query.min_price.as_deref())?;
        let max_price = parse_price("max_price", query.max_price.as_deref())?;
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            return Err(AppError::BadRequest(
                "min_price must not exceed max_price".to_string(),
            ));
        }

        let page = parse_count("page", query.page.as_deref())?.unwrap_or(1);
        let page_size = parse_count("page_size", query.page_size.as_deref())?
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size > MAX_PAGE_SIZE {
            return Err(AppError::BadRequest(format!(
                "page_size must be at most {MAX_PAGE_SIZE}"
            )));
        }

        let sort = non_blank(query.sort.as_deref())
            .map(|raw| raw.parse::<SortOrder>().map_err(AppError::BadRequest))
            .transpose()?;

        Ok(Self {
            keywords,
            category_id,
            min_price,
            max_price,
            page,
            page_size,
            sort,
        })
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_price(field: &str, raw: Option<&str>) -> Result<Option<Decimal>> {
    non_blank(raw)
        .map(|raw| parse_amount(raw).map_err(|e| AppError::BadRequest(format!("{field}: {e}"))))
        .transpose()
}

/// Parse a 1-based count.
fn parse_count(field: &str, raw: Option<&str>) -> Result<Option<u32>> {
    non_blank(raw)
        .map(|raw| match raw.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(AppError::BadRequest(format!(
                "{field} must be a positive integer"
            ))),
        })
        .transpose()
}

/// Search the catalog.
#[instrument(skip(state, query))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let params = SearchParams::try_from(query)?;
    let response = catalog::search(state.affiliate(), state.config().markup, &params).await?;
    Ok(Json(response))
}

/// Colour and image for one SKU.
///
/// A failed upstream lookup yields an empty detail rather than an error.
#[instrument(skip(state))]
pub async fn sku_detail(
    State(state): State<AppState>,
    Path((product_id, sku_id)): Path<(String, String)>,
) -> Result<Json<SkuDetail>> {
    let (product_id, sku_id) = parse_ids(&product_id, &sku_id)?;
    Ok(Json(lookup_sku(state.affiliate(), &product_id, &sku_id).await))
}

/// Shipping query parameters.
#[derive(Debug, Deserialize)]
pub struct ShippingParams {
    pub sku_id: Option<String>,
    pub country: Option<String>,
}

/// Shipping fee and delivery window for a product.
///
/// A failed upstream lookup yields a zero quote rather than an error.
#[instrument(skip(state, params))]
pub async fn shipping(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<ShippingParams>,
) -> Result<Json<ShippingQuote>> {
    let sku_id = non_blank(params.sku_id.as_deref())
        .ok_or_else(|| AppError::BadRequest("sku_id is required".to_string()))?;
    let (product_id, sku_id) = parse_ids(&product_id, sku_id)?;

    let country = non_blank(params.country.as_deref())
        .map(|c| {
            if c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic()) {
                Ok(c.to_ascii_uppercase())
            } else {
                Err(AppError::BadRequest(
                    "country must be a two-letter code".to_string(),
                ))
            }
        })
        .transpose()?;

    let quote =
        catalog::shipping_or_zero(state.affiliate(), &product_id, &sku_id, country.as_deref())
            .await;
    Ok(Json(quote))
}

fn parse_ids(product_id: &str, sku_id: &str) -> Result<(ProductId, SkuId)> {
    let product_id = ProductId::parse(product_id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let sku_id = SkuId::parse(sku_id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok((product_id, sku_id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(keywords: &str) -> SearchQuery {
        SearchQuery {
            keywords: Some(keywords.to_string()),
            ..SearchQuery::default()
        }
    }

    #[test]
    fn test_defaults() {
        let params = SearchParams::try_from(query("  lamp ")).unwrap();
        assert_eq!(params.keywords, "lamp");
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, DEFAULT_PAGE_SIZE);
        assert!(params.sort.is_none());
    }

    #[test]
    fn test_blank_keywords_rejected() {
        assert!(matches!(
            SearchParams::try_from(query("   ")),
            Err(AppError::BadRequest(_))
        ));
        assert!(SearchParams::try_from(SearchQuery::default()).is_err());
    }

    #[test]
    fn test_price_bounds() {
        let mut q = query("lamp");
        q.min_price = Some("5".to_string());
        q.max_price = Some("15.50".to_string());
        let params = SearchParams::try_from(q).unwrap();
        assert_eq!(params.min_price, Some(Decimal::from(5)));

        let mut q = query("lamp");
        q.min_price = Some("20".to_string());
        q.max_price = Some("10".to_string());
        assert!(SearchParams::try_from(q).is_err());

        let mut q = query("lamp");
        q.min_price = Some("-1".to_string());
        assert!(SearchParams::try_from(q).is_err());

        let mut q = query("lamp");
        q.max_price = Some("cheap".to_string());
        assert!(SearchParams::try_from(q).is_err());
    }

    #[test]
    fn test_paging_limits() {
        let mut q = query("lamp");
        q.page_size = Some(MAX_PAGE_SIZE.to_string());
        assert_eq!(SearchParams::try_from(q).unwrap().page_size, MAX_PAGE_SIZE);

        let mut q = query("lamp");
        q.page_size = Some((MAX_PAGE_SIZE + 1).to_string());
        assert!(SearchParams::try_from(q).is_err());

        let mut q = query("lamp");
        q.page = Some("0".to_string());
        assert!(SearchParams::try_from(q).is_err());
    }

    #[test]
    fn test_sort_and_category() {
        let mut q = query("lamp");
        q.sort = Some("price_desc".to_string());
        q.category_id = Some("200001".to_string());
        let params = SearchParams::try_from(q).unwrap();
        assert_eq!(params.sort, Some(SortOrder::PriceDesc));
        assert_eq!(params.category_id, Some(CategoryId::new("200001")));

        let mut q = query("lamp");
        q.sort = Some("random".to_string());
        assert!(SearchParams::try_from(q).is_err());
    }

    #[test]
    fn test_parse_ids_rejects_bad_characters() {
        assert!(parse_ids("1005", "12-a").is_ok());
        assert!(parse_ids("1005/../x", "1").is_err());
    }
}
