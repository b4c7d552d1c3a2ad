//! Affiliate catalog API client.
//!
//! # Architecture
//!
//! - One gateway endpoint (`/sync`); the API method is a query parameter
//! - Every request is signed (see [`signing`]) with a fresh millisecond timestamp
//! - Responses come wrapped in `<method_with_underscores>_response.resp_result`
//! - No caching: SKU details and shipping quotes are fetched per request
//!
//! # Methods
//!
//! - `aliexpress.affiliate.product.query` - keyword search
//! - `aliexpress.affiliate.product.shipping.get` - shipping fee and delivery window
//! - `aliexpress.affiliate.product.sku.detail.get` - SKU colour and image
//!
//! # Example
//!
//! ```rust,ignore
//! use dropship_relay::aliexpress::{AffiliateClient, ProductQuery};
//!
//! let client = AffiliateClient::new(&config.aliexpress, config.upstream_timeout)?;
//! let page = client.query_products(&ProductQuery::new("phone case")).await?;
//! ```

pub mod signing;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use dropship_relay_core::{CategoryId, CurrencyCode, ProductId, SkuId};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::AliExpressConfig;
use crate::models::{ShippingQuote, SkuDetail, SortOrder};

pub use signing::{Credentials, SignedRequest};
pub use types::{AffiliateProduct, ProductQueryResult};

use types::{GatewayError, RespResult, ShippingResult, SkuDetailResult};

const METHOD_PRODUCT_QUERY: &str = "aliexpress.affiliate.product.query";
const METHOD_SHIPPING_GET: &str = "aliexpress.affiliate.product.shipping.get";
const METHOD_SKU_DETAIL_GET: &str = "aliexpress.affiliate.product.sku.detail.get";

/// `resp_code` for a successful call.
const RESP_CODE_OK: i64 = 200;

/// `resp_code` the gateway uses for "no results".
const RESP_CODE_NO_RESULT: i64 = 405;

/// Maximum body length copied into logs and errors.
const MAX_LOGGED_BODY: usize = 500;

/// Errors that can occur when talking to the affiliate API.
#[derive(Debug, Error)]
pub enum AffiliateError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Gateway rejected the call (bad signature, unknown method, ...).
    #[error("Gateway error {code}: {message}")]
    Gateway { code: String, message: String },

    /// The method ran but reported a failure in `resp_result`.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response did not contain the expected envelope.
    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// The upstream has no data for the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request signing failed.
    #[error("Signing error: {0}")]
    Signing(String),
}

/// Parameters for a product search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub keywords: String,
    pub category_id: Option<CategoryId>,
    pub page: u32,
    pub page_size: u32,
    pub sort: Option<SortOrder>,
}

impl ProductQuery {
    /// A first-page query with the default page size.
    #[must_use]
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            category_id: None,
            page: 1,
            page_size: 20,
            sort: None,
        }
    }
}

/// Client for the affiliate API gateway.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct AffiliateClient {
    inner: Arc<AffiliateClientInner>,
}

struct AffiliateClientInner {
    client: reqwest::Client,
    endpoint: String,
    app_key: String,
    app_secret: SecretString,
    tracking_id: String,
    ship_to_country: String,
    target_currency: CurrencyCode,
    target_language: String,
}

impl std::fmt::Debug for AffiliateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffiliateClient")
            .field("endpoint", &self.inner.endpoint)
            .field("app_key", &self.inner.app_key)
            .field("app_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl AffiliateClient {
    /// Create a new affiliate API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &AliExpressConfig, timeout: Duration) -> Result<Self, AffiliateError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(AffiliateClientInner {
                client,
                endpoint: config.api_url.clone(),
                app_key: config.app_key.clone(),
                app_secret: config.app_secret.clone(),
                tracking_id: config.tracking_id.clone(),
                ship_to_country: config.ship_to_country.clone(),
                target_currency: config.target_currency,
                target_language: config.target_language.clone(),
            }),
        })
    }

    /// Default destination country for shipping quotes.
    #[must_use]
    pub fn ship_to_country(&self) -> &str {
        &self.inner.ship_to_country
    }

    /// Sign `params` for `method` with the current time.
    ///
    /// Adds the tracking, currency and language parameters every call carries.
    ///
    /// # Errors
    ///
    /// Returns `AffiliateError::Signing` if signing fails.
    pub fn sign(
        &self,
        method: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<SignedRequest, AffiliateError> {
        let common = [
            ("tracking_id", self.inner.tracking_id.clone()),
            ("target_currency", self.inner.target_currency.to_string()),
            ("target_language", self.inner.target_language.clone()),
        ];

        SignedRequest::new(
            method,
            common.into_iter().chain(params),
            Credentials {
                app_key: &self.inner.app_key,
                app_secret: &self.inner.app_secret,
            },
            chrono::Utc::now().timestamp_millis(),
        )
    }

    /// Execute a signed call and unwrap its `resp_result`.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<T, AffiliateError> {
        let signed = self.sign(method, params)?;

        let response = self
            .inner
            .client
            .get(&self.inner.endpoint)
            .query(signed.params())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&body),
                "Affiliate API returned non-success status"
            );
            return Err(AffiliateError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        parse_envelope(method, &body)
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// Search the catalog.
    ///
    /// An upstream "no results" answer is returned as an empty page.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(keywords = %query.keywords))]
    pub async fn query_products(
        &self,
        query: &ProductQuery,
    ) -> Result<ProductQueryResult, AffiliateError> {
        let mut params = vec![
            ("keywords", query.keywords.clone()),
            ("page_no", query.page.to_string()),
            ("page_size", query.page_size.to_string()),
            ("ship_to_country", self.inner.ship_to_country.clone()),
        ];
        if let Some(category_id) = &query.category_id {
            params.push(("category_ids", category_id.to_string()));
        }
        if let Some(sort) = query.sort {
            params.push(("sort", sort.as_upstream().to_string()));
        }

        match self.execute::<ProductQueryResult>(METHOD_PRODUCT_QUERY, params).await {
            Ok(result) => {
                debug!(
                    total = ?result.total_record_count,
                    page = ?result.current_page_no,
                    "Product query completed"
                );
                Ok(result)
            }
            Err(AffiliateError::NotFound(_)) => {
                debug!("Product query returned no results");
                Ok(ProductQueryResult::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Get the shipping fee and delivery window for a product/SKU.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or carries no shipping data.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn shipping_quote(
        &self,
        product_id: &ProductId,
        sku_id: &SkuId,
        ship_to_country: Option<&str>,
    ) -> Result<ShippingQuote, AffiliateError> {
        let country = ship_to_country.unwrap_or(&self.inner.ship_to_country);
        let params = vec![
            ("product_id", product_id.to_string()),
            ("sku_id", sku_id.to_string()),
            ("ship_to_country", country.to_ascii_uppercase()),
        ];

        let result = self
            .execute::<ShippingResult>(METHOD_SHIPPING_GET, params)
            .await?;

        let fee = result.shipping_fee.ok_or_else(|| {
            AffiliateError::NotFound(format!("No shipping fee for product {product_id}"))
        })?;
        let min_delivery_days = result.min_delivery_days.unwrap_or(0);
        let max_delivery_days = result.max_delivery_days.unwrap_or(min_delivery_days);

        Ok(ShippingQuote {
            fee,
            min_delivery_days,
            max_delivery_days: max_delivery_days.max(min_delivery_days),
        })
    }

    /// Get colour and image for one SKU of a product.
    ///
    /// If the upstream does not list the requested SKU, the first listed SKU
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or lists no SKUs.
    #[instrument(skip(self), fields(product_id = %product_id, sku_id = %sku_id))]
    pub async fn sku_detail(
        &self,
        product_id: &ProductId,
        sku_id: &SkuId,
    ) -> Result<SkuDetail, AffiliateError> {
        let params = vec![
            ("product_id", product_id.to_string()),
            ("sku_ids", sku_id.to_string()),
            ("ship_to_country", self.inner.ship_to_country.clone()),
        ];

        let result = self
            .execute::<SkuDetailResult>(METHOD_SKU_DETAIL_GET, params)
            .await?;

        let info = result
            .traffic_sku_info_list
            .iter()
            .find(|info| info.sku_id.as_ref() == Some(sku_id))
            .or_else(|| result.traffic_sku_info_list.first())
            .ok_or_else(|| AffiliateError::NotFound(format!("No SKUs for product {product_id}")))?;

        Ok(SkuDetail {
            color: info.color(),
            image: info.image(),
        })
    }
}

/// Name of the envelope object wrapping a method's response.
fn envelope_key(method: &str) -> String {
    format!("{}_response", method.replace('.', "_"))
}

/// Unwrap `<method>_response.resp_result` into `T`.
fn parse_envelope<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, AffiliateError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %truncate(body),
            "Failed to parse affiliate API response"
        );
        AffiliateError::Parse(e)
    })?;

    let serde_json::Value::Object(mut root) = value else {
        return Err(AffiliateError::UnexpectedResponse(
            "response is not a JSON object".to_string(),
        ));
    };

    if let Some(error) = root.remove("error_response") {
        let error: GatewayError = serde_json::from_value(error)?;
        tracing::warn!(
            code = ?error.code,
            message = ?error.msg,
            request_id = ?error.request_id,
            "Affiliate gateway rejected request"
        );
        return Err(AffiliateError::Gateway {
            code: error.code.unwrap_or_default(),
            message: error.msg.unwrap_or_default(),
        });
    }

    let key = envelope_key(method);
    let mut envelope = root
        .remove(&key)
        .ok_or_else(|| AffiliateError::UnexpectedResponse(format!("missing {key}")))?;

    // Most methods nest the payload in `resp_result`; some use `result`.
    let resp_result = envelope
        .as_object_mut()
        .and_then(|obj| obj.remove("resp_result").or_else(|| obj.remove("result")))
        .ok_or_else(|| AffiliateError::UnexpectedResponse(format!("{key} has no result")))?;

    let resp: RespResult<T> = serde_json::from_value(resp_result)?;
    let code = resp.resp_code.unwrap_or(RESP_CODE_OK);
    let message = resp.resp_msg.unwrap_or_default();

    match code {
        RESP_CODE_OK => resp
            .result
            .ok_or_else(|| AffiliateError::NotFound(format!("{method}: empty result"))),
        RESP_CODE_NO_RESULT => Err(AffiliateError::NotFound(format!("{method}: {message}"))),
        _ => Err(AffiliateError::Api { code, message }),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY).collect()
}
