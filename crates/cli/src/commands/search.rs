//! Run the search pipeline from the command line.

use std::io::Write;
use std::time::Duration;

use dropship_relay::aliexpress::{AffiliateClient, AffiliateError};
use dropship_relay::config::{AliExpressConfig, ConfigError, markup_from_env};
use dropship_relay::services::catalog::{self, SearchParams};
use dropship_relay_core::{CategoryId, IdError, PriceError, parse_amount};
use thiserror::Error;

/// Timeout for each upstream call made by the CLI.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the `search` command.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid price: {0}")]
    Price(#[from] PriceError),

    #[error("Invalid category id: {0}")]
    Category(#[from] IdError),

    #[error("Search failed: {0}")]
    Affiliate(#[from] AffiliateError),

    #[error("Failed to write output: {0}")]
    Output(String),
}

/// Arguments for a CLI search.
#[derive(Debug)]
pub struct SearchArgs {
    pub keywords: String,
    pub category_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub page: u32,
}

/// Search and print the response as pretty JSON.
pub async fn run(args: SearchArgs) -> Result<(), SearchError> {
    let config = AliExpressConfig::from_env()?;
    let markup = markup_from_env()?;
    let client = AffiliateClient::new(&config, UPSTREAM_TIMEOUT)?;

    let mut params = SearchParams::new(args.keywords);
    params.page = args.page.max(1);
    params.category_id = args
        .category_id
        .as_deref()
        .map(CategoryId::parse)
        .transpose()?;
    params.min_price = args.min_price.as_deref().map(parse_amount).transpose()?;
    params.max_price = args.max_price.as_deref().map(parse_amount).transpose()?;

    let response = catalog::search(&client, markup, &params).await?;
    tracing::info!(
        products = response.products.len(),
        total = response.total_records,
        "Search complete"
    );

    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| SearchError::Output(e.to_string()))?;
    writeln!(std::io::stdout().lock(), "{json}").map_err(|e| SearchError::Output(e.to_string()))?;
    Ok(())
}
