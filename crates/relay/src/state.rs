//! Application state shared across handlers.

use std::sync::Arc;

use crate::aliexpress::{AffiliateClient, AffiliateError};
use crate::config::RelayConfig;
use crate::stripe::{StripeClient, StripeError};

/// Error creating the upstream clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("affiliate client: {0}")]
    Affiliate(#[from] AffiliateError),
    #[error("stripe client: {0}")]
    Stripe(#[from] StripeError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and is read-only after startup;
/// nothing in a request mutates it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RelayConfig,
    affiliate: AffiliateClient,
    stripe: StripeClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an upstream HTTP client cannot be built.
    pub fn new(config: RelayConfig) -> Result<Self, StateError> {
        let affiliate = AffiliateClient::new(&config.aliexpress, config.upstream_timeout)?;
        let stripe = StripeClient::new(&config.stripe, config.upstream_timeout)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                affiliate,
                stripe,
            }),
        })
    }

    /// Get a reference to the relay configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Get a reference to the affiliate API client.
    #[must_use]
    pub fn affiliate(&self) -> &AffiliateClient {
        &self.inner.affiliate
    }

    /// Get a reference to the Stripe client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }
}
