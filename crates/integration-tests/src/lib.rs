//! Integration test harness for the dropship relay.
//!
//! Each test starts a fake upstream (affiliate gateway and Stripe on one
//! axum server bound to `127.0.0.1:0`) and a real relay pointed at it, then
//! talks to the relay over HTTP with `reqwest`.
//!
//! The fake gateway checks every request's signature with the same secret the
//! relay is configured with, so a signing regression fails every test.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dropship-relay-integration-tests
//! ```

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dropship_relay::aliexpress::signing::{SIGN_PARAM, sign};
use dropship_relay::config::{AliExpressConfig, CryptoWalletConfig, RelayConfig, StripeConfig};
use dropship_relay::state::AppState;
use dropship_relay_core::{CurrencyCode, Markup};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};

/// App secret shared by the relay and the fake gateway.
pub const APP_SECRET: &str = "integration_test_app_secret_9f2c";

/// Markup the test relay applies.
pub const MARKUP_PERCENT: u32 = 25;

/// Shipping answer for one product.
#[derive(Debug, Clone)]
pub enum ShippingReply {
    Quote {
        fee: &'static str,
        min_days: u32,
        max_days: u32,
    },
    /// Gateway answers with an API error.
    Error,
}

/// What the fake upstreams answer.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    /// Products returned by the product query.
    pub products: Vec<Value>,
    /// `total_record_count` returned by the product query.
    pub total_records: u64,
    /// Per-product shipping answers; missing products get an error.
    pub shipping: HashMap<String, ShippingReply>,
    /// SKU list returned by the SKU detail call; `None` answers with an error.
    pub skus: Option<Vec<Value>>,
    /// Make the product query itself fail.
    pub query_fails: bool,
    /// Make Stripe reject the checkout session.
    pub stripe_fails: bool,
}

/// Requests the fake upstreams received.
#[derive(Debug, Default)]
pub struct Recorded {
    /// Query parameters of every gateway call, in arrival order.
    pub gateway_calls: Vec<HashMap<String, String>>,
    /// Form bodies posted to Stripe.
    pub stripe_sessions: Vec<Vec<(String, String)>>,
    /// Gateway calls whose signature did not verify.
    pub bad_signatures: usize,
}

impl Recorded {
    /// Gateway calls for one API method.
    #[must_use]
    pub fn calls_for(&self, method: &str) -> Vec<&HashMap<String, String>> {
        self.gateway_calls
            .iter()
            .filter(|call| call.get("method").map(String::as_str) == Some(method))
            .collect()
    }
}

#[derive(Clone)]
struct FakeState {
    scenario: Arc<Scenario>,
    recorded: Arc<Mutex<Recorded>>,
}

/// A running relay and its fake upstreams.
pub struct TestRelay {
    pub base_url: String,
    pub client: reqwest::Client,
    recorded: Arc<Mutex<Recorded>>,
}

impl TestRelay {
    /// Start fake upstreams for `scenario` and a relay in front of them.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot bind a local port.
    pub async fn start(scenario: Scenario) -> Self {
        Self::start_with(scenario, None).await
    }

    /// Like [`TestRelay::start`], with crypto checkout enabled.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot bind a local port.
    pub async fn start_with_wallet(scenario: Scenario) -> Self {
        Self::start_with(scenario, Some(wallet())).await
    }

    async fn start_with(scenario: Scenario, crypto: Option<CryptoWalletConfig>) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let upstream = spawn_fake_upstream(FakeState {
            scenario: Arc::new(scenario),
            recorded: Arc::clone(&recorded),
        })
        .await;

        let state = AppState::new(relay_config(&format!("http://{upstream}"), crypto))
            .expect("relay state");
        let app = dropship_relay::build_router(state);
        let relay = serve(app).await;

        Self {
            base_url: format!("http://{relay}"),
            client: reqwest::Client::new(),
            recorded,
        }
    }

    /// URL for a relay path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Inspect what the fake upstreams received.
    pub fn recorded<R>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        let guard = self.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

/// Relay configuration pointing both upstreams at `upstream_url`.
///
/// # Panics
///
/// Panics only if the fixed test values fail to parse.
#[must_use]
pub fn relay_config(upstream_url: &str, crypto: Option<CryptoWalletConfig>) -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".parse().expect("loopback address"),
        port: 0,
        aliexpress: AliExpressConfig {
            api_url: format!("{upstream_url}/sync"),
            app_key: "503921".to_string(),
            app_secret: SecretString::from(APP_SECRET),
            tracking_id: "relay_tracking".to_string(),
            ship_to_country: "US".to_string(),
            target_currency: CurrencyCode::USD,
            target_language: "EN".to_string(),
        },
        stripe: StripeConfig {
            api_url: upstream_url.to_string(),
            secret_key: SecretString::from("sk_test_integration_4b7e1d"),
            currency: CurrencyCode::USD,
            success_url: "https://shop.test/success".to_string(),
            cancel_url: "https://shop.test/cancel".to_string(),
        },
        crypto,
        markup: Markup::from_percent(Decimal::from(MARKUP_PERCENT)).expect("valid markup"),
        upstream_timeout: Duration::from_secs(5),
        cors_allowed_origins: Vec::new(),
        static_dir: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// The wallet used by crypto checkout tests.
#[must_use]
pub fn wallet() -> CryptoWalletConfig {
    CryptoWalletConfig {
        wallet_address: "0x52908400098527886E0F7030069857D2E4169EE7".to_string(),
        network: "ethereum".to_string(),
        asset: "USDC".to_string(),
        checkout_ttl: chrono::Duration::minutes(30),
    }
}

/// A product as the gateway returns it.
#[must_use]
pub fn product(id: &str, sale_price: &str, first_category: &str, second_category: &str) -> Value {
    json!({
        "product_id": id.parse::<u64>().map_or_else(|_| json!(id), |n| json!(n)),
        "sku_id": format!("{id}001"),
        "product_title": format!("Product {id}"),
        "target_sale_price": sale_price,
        "target_original_price": sale_price,
        "target_sale_price_currency": "USD",
        "product_main_image_url": format!("https://img.test/{id}.jpg"),
        "first_level_category_id": first_category,
        "second_level_category_id": second_category,
    })
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server");
    });

    addr
}

async fn spawn_fake_upstream(state: FakeState) -> SocketAddr {
    let app = Router::new()
        .route("/sync", get(gateway))
        .route("/v1/checkout/sessions", post(stripe_sessions))
        .with_state(state);
    serve(app).await
}

// =============================================================================
// Fake affiliate gateway
// =============================================================================

async fn gateway(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let signature_ok = verify_signature(&params);
    {
        let mut recorded = state.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        recorded.gateway_calls.push(params.clone());
        if !signature_ok {
            recorded.bad_signatures += 1;
        }
    }

    if !signature_ok {
        return Json(json!({
            "error_response": {"code": "IncompleteSignature", "msg": "signature mismatch"}
        }));
    }

    let method = params.get("method").cloned().unwrap_or_default();
    let key = format!("{}_response", method.replace('.', "_"));
    let scenario = &state.scenario;

    let resp_result = match method.as_str() {
        "aliexpress.affiliate.product.query" if scenario.query_fails => {
            json!({"resp_code": 402, "resp_msg": "Invalid input"})
        }
        "aliexpress.affiliate.product.query" if scenario.products.is_empty() => {
            json!({"resp_code": 405, "resp_msg": "No results"})
        }
        "aliexpress.affiliate.product.query" => json!({
            "resp_code": 200,
            "resp_msg": "Call succeeds",
            "result": {
                "current_page_no": params.get("page_no").and_then(|p| p.parse::<u32>().ok()),
                "current_record_count": scenario.products.len(),
                "total_record_count": scenario.total_records,
                "products": {"product": scenario.products},
            }
        }),
        "aliexpress.affiliate.product.shipping.get" => {
            let product_id = params.get("product_id").cloned().unwrap_or_default();
            match scenario.shipping.get(&product_id) {
                Some(ShippingReply::Quote {
                    fee,
                    min_days,
                    max_days,
                }) => json!({
                    "resp_code": 200,
                    "result": {
                        "shipping_fee": fee,
                        "shipping_fee_currency": "USD",
                        "min_delivery_days": min_days,
                        "max_delivery_days": max_days,
                    }
                }),
                Some(ShippingReply::Error) | None => {
                    json!({"resp_code": 500, "resp_msg": "Shipping service unavailable"})
                }
            }
        }
        "aliexpress.affiliate.product.sku.detail.get" => match &scenario.skus {
            Some(skus) => json!({
                "resp_code": 200,
                "result": {"traffic_sku_info_list": skus}
            }),
            None => json!({"resp_code": 500, "resp_msg": "SKU service unavailable"}),
        },
        _ => {
            return Json(json!({
                "error_response": {"code": "InvalidApiPath", "msg": "unknown method"}
            }));
        }
    };

    Json(json!({ key: {"resp_result": resp_result} }))
}

fn verify_signature(params: &HashMap<String, String>) -> bool {
    let Some(received) = params.get(SIGN_PARAM) else {
        return false;
    };
    let unsigned: BTreeMap<String, String> = params
        .iter()
        .filter(|(k, _)| k.as_str() != SIGN_PARAM)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    sign(&unsigned, &SecretString::from(APP_SECRET)).is_ok_and(|expected| &expected == received)
}

// =============================================================================
// Fake Stripe
// =============================================================================

async fn stripe_sessions(
    State(state): State<FakeState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let count = {
        let mut recorded = state.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        recorded.stripe_sessions.push(fields);
        recorded.stripe_sessions.len()
    };

    if state.scenario.stripe_fails {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {"type": "invalid_request_error", "message": "Invalid currency"}
            })),
        )
            .into_response();
    }

    let id = format!("cs_test_{count}");
    Json(json!({
        "id": id,
        "object": "checkout.session",
        "url": format!("https://checkout.stripe.test/c/pay/{id}"),
    }))
    .into_response()
}

/// Look up a form field by key.
#[must_use]
pub fn form_field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
