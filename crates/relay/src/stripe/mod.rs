//! Stripe Checkout Sessions client.
//!
//! Only the one call the relay needs: create a hosted checkout session for a
//! set of ad-hoc line items (`price_data`, no pre-created Stripe prices).
//! Stripe takes form-encoded bodies with bracketed keys, e.g.
//! `line_items[0][price_data][unit_amount]=1250`.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;

/// Path of the Checkout Sessions endpoint.
const CHECKOUT_SESSIONS_PATH: &str = "/v1/checkout/sessions";

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe returned an error object.
    #[error("API error: {status} {kind} - {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// One ad-hoc line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    /// Unit price in minor units (cents).
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Everything needed to create a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckoutSession {
    /// Lower-case ISO currency code.
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
}

impl NewCheckoutSession {
    /// Flatten into Stripe's bracketed form encoding.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            let price_data = format!("{prefix}[price_data]");
            let product_data = format!("{price_data}[product_data]");

            fields.push((format!("{price_data}[currency]"), self.currency.clone()));
            fields.push((
                format!("{price_data}[unit_amount]"),
                item.unit_amount.to_string(),
            ));
            fields.push((format!("{product_data}[name]"), item.name.clone()));
            if let Some(description) = &item.description {
                fields.push((format!("{product_data}[description]"), description.clone()));
            }
            for (j, image) in item.images.iter().enumerate() {
                fields.push((format!("{product_data}[images][{j}]"), image.clone()));
            }
            fields.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        for (key, value) in &self.metadata {
            fields.push((format!("metadata[{key}]"), value.clone()));
        }

        fields
    }
}

/// The parts of a created session the relay hands back.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_url: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_url", &self.inner.api_url)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                secret_key: config.secret_key.clone(),
            }),
        })
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects the session.
    #[instrument(skip(self, session), fields(line_items = session.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CreatedSession, StripeError> {
        let url = format!("{}{CHECKOUT_SESSIONS_PATH}", self.inner.api_url);

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&session.form_fields())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let (kind, message) = serde_json::from_str::<ErrorEnvelope>(&body).map_or_else(
                |_| ("unknown".to_string(), body.chars().take(200).collect()),
                |envelope| {
                    (
                        envelope.error.kind.unwrap_or_else(|| "unknown".to_string()),
                        envelope.error.message.unwrap_or_default(),
                    )
                },
            );
            tracing::error!(
                status = %status,
                kind = %kind,
                message = %message,
                "Stripe rejected checkout session"
            );
            return Err(StripeError::Api {
                status: status.as_u16(),
                kind,
                message,
            });
        }

        let created: CreatedSession =
            serde_json::from_str(&body).map_err(|e| StripeError::Parse(e.to_string()))?;
        tracing::info!(session_id = %created.id, "Stripe checkout session created");

        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_fields_flatten_line_items() {
        let session = NewCheckoutSession {
            currency: "usd".to_string(),
            line_items: vec![
                LineItem {
                    name: "Phone Case - Red".to_string(),
                    description: None,
                    images: vec!["https://img.test/red.jpg".to_string()],
                    unit_amount: 1250,
                    quantity: 2,
                },
                LineItem {
                    name: "Shipping".to_string(),
                    description: Some("Standard shipping".to_string()),
                    images: Vec::new(),
                    unit_amount: 300,
                    quantity: 1,
                },
            ],
            success_url: "https://shop.test/ok".to_string(),
            cancel_url: "https://shop.test/cancel".to_string(),
            metadata: vec![("product_id".to_string(), "1005".to_string())],
        };

        let fields = session.form_fields();

        assert_eq!(field(&fields, "mode"), Some("payment"));
        assert_eq!(
            field(&fields, "line_items[0][price_data][unit_amount]"),
            Some("1250")
        );
        assert_eq!(
            field(&fields, "line_items[0][price_data][product_data][images][0]"),
            Some("https://img.test/red.jpg")
        );
        assert_eq!(field(&fields, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            field(&fields, "line_items[1][price_data][product_data][name]"),
            Some("Shipping")
        );
        assert_eq!(
            field(&fields, "line_items[1][price_data][product_data][description]"),
            Some("Standard shipping")
        );
        assert_eq!(field(&fields, "line_items[1][price_data][currency]"), Some("usd"));
        assert_eq!(field(&fields, "metadata[product_id]"), Some("1005"));
        assert!(field(&fields, "line_items[1][price_data][product_data][images][0]").is_none());
    }

    #[test]
    fn test_stripe_error_display() {
        let err = StripeError::Api {
            status: 400,
            kind: "invalid_request_error".to_string(),
            message: "Missing success_url".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error: 400 invalid_request_error - Missing success_url"
        );
    }
}
