//! Relay configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ALIEXPRESS_APP_KEY` - Affiliate API application key
//! - `ALIEXPRESS_APP_SECRET` - Affiliate API application secret (request signing)
//! - `ALIEXPRESS_TRACKING_ID` - Affiliate tracking ID attached to every call
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//! - `CHECKOUT_SUCCESS_URL` - Where Stripe sends the shopper after payment
//! - `CHECKOUT_CANCEL_URL` - Where Stripe sends the shopper on cancel
//!
//! ## Optional
//! - `RELAY_HOST` - Bind address (default: 127.0.0.1)
//! - `RELAY_PORT` - Listen port (default: 8080)
//! - `ALIEXPRESS_API_URL` - Gateway URL (default: <https://api-sg.aliexpress.com/sync>)
//! - `ALIEXPRESS_SHIP_TO_COUNTRY` - Default destination country (default: US)
//! - `ALIEXPRESS_TARGET_CURRENCY` - Currency for upstream prices (default: USD)
//! - `ALIEXPRESS_TARGET_LANGUAGE` - Language for upstream titles (default: EN)
//! - `PRICE_MARKUP_PERCENT` - Markup added to upstream prices (default: 25)
//! - `UPSTREAM_TIMEOUT_SECS` - Timeout for outbound calls (default: 10)
//! - `STRIPE_API_URL` - Stripe API base (default: <https://api.stripe.com>)
//! - `CRYPTO_WALLET_ADDRESS` - Receiving wallet; crypto checkout is disabled without it
//! - `CRYPTO_NETWORK` - Network name shown to the shopper (default: ethereum)
//! - `CRYPTO_ASSET` - Asset to pay with (default: USDC)
//! - `CRYPTO_CHECKOUT_TTL_MINUTES` - Crypto checkout validity window (default: 30)
//! - `CORS_ALLOWED_ORIGINS` - Comma-separated origins (default: any)
//! - `STATIC_DIR` - Directory with the storefront bundle to serve as fallback
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use dropship_relay_core::{CurrencyCode, Markup, parse_amount};
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Relay application configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Affiliate API configuration
    pub aliexpress: AliExpressConfig,
    /// Stripe configuration
    pub stripe: StripeConfig,
    /// Crypto wallet checkout, if enabled
    pub crypto: Option<CryptoWalletConfig>,
    /// Markup applied to upstream prices
    pub markup: Markup,
    /// Timeout for every outbound HTTP call
    pub upstream_timeout: Duration,
    /// Allowed CORS origins (empty means any)
    pub cors_allowed_origins: Vec<HeaderValue>,
    /// Storefront bundle served for unmatched paths
    pub static_dir: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Affiliate API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct AliExpressConfig {
    /// Gateway endpoint (the `/sync` URL)
    pub api_url: String,
    /// Application key
    pub app_key: String,
    /// Application secret used to sign requests
    pub app_secret: SecretString,
    /// Affiliate tracking ID
    pub tracking_id: String,
    /// Default ship-to country (ISO 3166-1 alpha-2)
    pub ship_to_country: String,
    /// Currency upstream prices are quoted in
    pub target_currency: CurrencyCode,
    /// Language for product titles
    pub target_language: String,
}

impl std::fmt::Debug for AliExpressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliExpressConfig")
            .field("api_url", &self.api_url)
            .field("app_key", &self.app_key)
            .field("app_secret", &"[REDACTED]")
            .field("tracking_id", &self.tracking_id)
            .field("ship_to_country", &self.ship_to_country)
            .field("target_currency", &self.target_currency)
            .field("target_language", &self.target_language)
            .finish()
    }
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// API base URL
    pub api_url: String,
    /// Secret API key
    pub secret_key: SecretString,
    /// Currency checkout sessions are charged in
    pub currency: CurrencyCode,
    /// Redirect after successful payment
    pub success_url: String,
    /// Redirect after cancelled payment
    pub cancel_url: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .finish()
    }
}

/// Crypto wallet checkout configuration.
#[derive(Debug, Clone)]
pub struct CryptoWalletConfig {
    /// Receiving wallet address
    pub wallet_address: String,
    /// Network the wallet lives on
    pub network: String,
    /// Asset the shopper pays with
    pub asset: String,
    /// How long a crypto checkout stays valid
    pub checkout_ttl: chrono::Duration,
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("RELAY_HOST", "127.0.0.1")?;
        let port = parse_env("RELAY_PORT", "8080")?;
        let upstream_timeout = Duration::from_secs(parse_env("UPSTREAM_TIMEOUT_SECS", "10")?);

        Ok(Self {
            host,
            port,
            aliexpress: AliExpressConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            crypto: CryptoWalletConfig::from_env()?,
            markup: markup_from_env()?,
            upstream_timeout,
            cors_allowed_origins: parse_origins(
                "CORS_ALLOWED_ORIGINS",
                get_optional_env("CORS_ALLOWED_ORIGINS").as_deref(),
            )?,
            static_dir: get_optional_env("STATIC_DIR").map(PathBuf::from),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AliExpressConfig {
    /// Load the affiliate API section on its own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            api_url: get_env_or_default(
                "ALIEXPRESS_API_URL",
                "https://api-sg.aliexpress.com/sync",
            ),
            app_key: get_required_env("ALIEXPRESS_APP_KEY")?,
            app_secret: get_validated_secret("ALIEXPRESS_APP_SECRET")?,
            tracking_id: get_required_env("ALIEXPRESS_TRACKING_ID")?,
            ship_to_country: get_env_or_default("ALIEXPRESS_SHIP_TO_COUNTRY", "US")
                .to_ascii_uppercase(),
            target_currency: parse_env("ALIEXPRESS_TARGET_CURRENCY", "USD")?,
            target_language: get_env_or_default("ALIEXPRESS_TARGET_LANGUAGE", "EN"),
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_env_or_default("STRIPE_API_URL", "https://api.stripe.com"),
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            currency: parse_env("STRIPE_CURRENCY", "USD")?,
            success_url: get_required_env("CHECKOUT_SUCCESS_URL")?,
            cancel_url: get_required_env("CHECKOUT_CANCEL_URL")?,
        })
    }
}

impl CryptoWalletConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(wallet_address) = get_optional_env("CRYPTO_WALLET_ADDRESS") else {
            return Ok(None);
        };
        let ttl_minutes: i64 = parse_env("CRYPTO_CHECKOUT_TTL_MINUTES", "30")?;
        if ttl_minutes <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CRYPTO_CHECKOUT_TTL_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Some(Self {
            wallet_address,
            network: get_env_or_default("CRYPTO_NETWORK", "ethereum"),
            asset: get_env_or_default("CRYPTO_ASSET", "USDC"),
            checkout_ttl: chrono::Duration::minutes(ttl_minutes),
        }))
    }
}

/// Load the price markup (used by the server and the CLI).
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if `PRICE_MARKUP_PERCENT` is not a
/// non-negative decimal.
pub fn markup_from_env() -> Result<Markup, ConfigError> {
    let raw = get_env_or_default("PRICE_MARKUP_PERCENT", "25");
    parse_amount(&raw)
        .and_then(Markup::from_percent)
        .map_err(|e| ConfigError::InvalidEnvVar("PRICE_MARKUP_PERCENT".to_string(), e.to_string()))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a comma-separated origin list into header values.
fn parse_origins(key: &str, raw: Option<&str>) -> Result<Vec<HeaderValue>, ConfigError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
