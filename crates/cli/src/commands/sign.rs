//! Sign an affiliate API call.
//!
//! Reads `ALIEXPRESS_APP_KEY`, `ALIEXPRESS_APP_SECRET` and `ALIEXPRESS_API_URL`
//! from the environment (or `.env`) and prints the full signed URL, which can
//! be pasted into curl to debug a call by hand.

use std::io::Write;

use dropship_relay::aliexpress::{AffiliateError, Credentials, SignedRequest};
use dropship_relay::config::{AliExpressConfig, ConfigError};
use thiserror::Error;

/// Errors from the `sign` command.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Signing failed: {0}")]
    Signing(#[from] AffiliateError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a `key=value` argument.
///
/// # Errors
///
/// Returns a message if there is no `=` or the key is empty.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Sign `method` with `params` and print the request URL.
pub fn run(
    method: &str,
    params: Vec<(String, String)>,
    timestamp: Option<i64>,
) -> Result<(), SignError> {
    let config = AliExpressConfig::from_env()?;
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let signed = SignedRequest::new(
        method,
        params,
        Credentials {
            app_key: &config.app_key,
            app_secret: &config.app_secret,
        },
        timestamp,
    )?;

    tracing::info!(method, timestamp, sign = signed.signature(), "Request signed");

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}?{}", config.api_url, signed.query_string())?;
    Ok(())
}
