//! Integration tests for the catalog endpoints.
//!
//! Run with: cargo test -p dropship-relay-integration-tests

use std::collections::HashMap;

use dropship_relay_integration_tests::{Scenario, ShippingReply, TestRelay, product};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn scenario() -> Scenario {
    Scenario {
        products: vec![
            product("1001", "10.00", "200", "201"),
            product("1002", "20.00", "300", "200"),
            product("1003", "4.00", "400", "401"),
            product("1004", "oops", "200", "201"),
        ],
        total_records: 240,
        shipping: HashMap::from([
            (
                "1001".to_string(),
                ShippingReply::Quote {
                    fee: "2.50",
                    min_days: 7,
                    max_days: 15,
                },
            ),
            ("1002".to_string(), ShippingReply::Error),
            (
                "1003".to_string(),
                ShippingReply::Quote {
                    fee: "0",
                    min_days: 3,
                    max_days: 5,
                },
            ),
        ]),
        ..Scenario::default()
    }
}

async fn search(relay: &TestRelay, query: &str) -> (StatusCode, Value) {
    let resp = relay
        .client
        .get(relay.url(&format!("/api/products/search?{query}")))
        .send()
        .await
        .expect("search request");
    let status = resp.status();
    (status, resp.json().await.expect("json body"))
}

fn ids(body: &Value) -> Vec<&str> {
    body["products"]
        .as_array()
        .expect("products array")
        .iter()
        .map(|p| p["id"].as_str().expect("id"))
        .collect()
}

#[tokio::test]
async fn test_health() {
    let relay = TestRelay::start(Scenario::default()).await;
    let resp = relay
        .client
        .get(relay.url("/health"))
        .send()
        .await
        .expect("health request");

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.expect("body"), "ok");
}

#[tokio::test]
async fn test_search_marks_up_and_enriches_in_upstream_order() {
    let relay = TestRelay::start(scenario()).await;
    let (status, body) = search(&relay, "keywords=phone%20case").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_records"], 240);
    assert_eq!(body["page"], 1);
    // 1004 has an unparseable price and is dropped.
    assert_eq!(ids(&body), vec!["1001", "1002", "1003"]);

    let first = &body["products"][0];
    assert_eq!(first["price"], "12.50");
    assert_eq!(first["shipping_fee"], "2.50");
    assert_eq!(first["min_delivery_days"], 7);
    assert_eq!(first["max_delivery_days"], 15);
    assert_eq!(first["sku_id"], "1001001");
    assert_eq!(first["image"], "https://img.test/1001.jpg");

    // A failed shipping lookup only zeroes that product.
    let second = &body["products"][1];
    assert_eq!(second["price"], "25.00");
    assert_eq!(second["shipping_fee"], "0");
    assert_eq!(second["max_delivery_days"], 0);

    relay.recorded(|recorded| {
        assert_eq!(recorded.bad_signatures, 0);
        assert_eq!(
            recorded
                .calls_for("aliexpress.affiliate.product.shipping.get")
                .len(),
            3
        );

        let query = recorded.calls_for("aliexpress.affiliate.product.query");
        let query = query.first().expect("product query call");
        assert_eq!(query.get("keywords").map(String::as_str), Some("phone case"));
        assert_eq!(query.get("tracking_id").map(String::as_str), Some("relay_tracking"));
        assert_eq!(query.get("target_currency").map(String::as_str), Some("USD"));
        assert_eq!(query.get("sign_method").map(String::as_str), Some("sha256"));
    });
}

#[tokio::test]
async fn test_search_category_filter_matches_either_level() {
    let relay = TestRelay::start(scenario()).await;
    let (status, body) = search(&relay, "keywords=case&category_id=200").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec!["1001", "1002"]);

    relay.recorded(|recorded| {
        let query = recorded.calls_for("aliexpress.affiliate.product.query");
        assert_eq!(
            query[0].get("category_ids").map(String::as_str),
            Some("200")
        );
    });
}

#[tokio::test]
async fn test_search_price_filter_is_inclusive_on_marked_up_price() {
    let relay = TestRelay::start(scenario()).await;

    // Marked-up prices: 12.50, 25.00, 5.00
    let (status, body) = search(&relay, "keywords=case&min_price=5&max_price=12.50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec!["1001", "1003"]);

    let (_, body) = search(&relay, "keywords=case&min_price=12.51").await;
    assert_eq!(ids(&body), vec!["1002"]);
}

#[tokio::test]
async fn test_search_no_results_is_empty_page() {
    let relay = TestRelay::start(Scenario::default()).await;
    let (status, body) = search(&relay, "keywords=nothing").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"], json!([]));
    assert_eq!(body["total_records"], 0);
}

#[tokio::test]
async fn test_search_upstream_failure_is_generic_bad_gateway() {
    let relay = TestRelay::start(Scenario {
        query_fails: true,
        ..scenario()
    })
    .await;
    let (status, body) = search(&relay, "keywords=case").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "External service error");
}

#[tokio::test]
async fn test_search_validation() {
    let relay = TestRelay::start(scenario()).await;

    for query in [
        "keywords=",
        "keywords=case&min_price=abc",
        "keywords=case&min_price=-1",
        "keywords=case&min_price=10&max_price=5",
        "keywords=case&page_size=51",
        "keywords=case&sort=newest",
    ] {
        let (status, body) = search(&relay, query).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query: {query}");
        assert!(body["error"].is_string(), "query: {query}");
    }

    relay.recorded(|recorded| assert!(recorded.gateway_calls.is_empty()));
}

#[tokio::test]
async fn test_shipping_endpoint() {
    let relay = TestRelay::start(scenario()).await;

    let resp = relay
        .client
        .get(relay.url("/api/products/1001/shipping?sku_id=1001001&country=gb"))
        .send()
        .await
        .expect("shipping request");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["fee"], "2.50");
    assert_eq!(body["min_delivery_days"], 7);

    relay.recorded(|recorded| {
        let calls = recorded.calls_for("aliexpress.affiliate.product.shipping.get");
        assert_eq!(calls[0].get("ship_to_country").map(String::as_str), Some("GB"));
    });

    // Upstream failure falls back to a zero quote.
    let body: Value = relay
        .client
        .get(relay.url("/api/products/1002/shipping?sku_id=1002001"))
        .send()
        .await
        .expect("shipping request")
        .json()
        .await
        .expect("json body");
    assert_eq!(body["fee"], "0");
}

#[tokio::test]
async fn test_sku_endpoint() {
    let relay = TestRelay::start(Scenario {
        skus: Some(vec![
            json!({"sku_id": "1001001", "color": "Red", "sku_image_link": "https://img.test/red.jpg"}),
            json!({"sku_id": 1_001_002, "sku_properties": "Color:Blue;Size:M"}),
        ]),
        ..scenario()
    })
    .await;

    let body: Value = relay
        .client
        .get(relay.url("/api/products/1001/skus/1001002"))
        .send()
        .await
        .expect("sku request")
        .json()
        .await
        .expect("json body");

    assert_eq!(body["color"], "Blue");
    assert!(body["image"].is_null());
}
