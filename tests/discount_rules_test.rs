//! Discount code rules end to end: amount math per type, eligibility
//! windows, usage ceilings, per-customer and first-order restrictions,
//! item scoping and the management endpoints.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{base_discount_request, dec_field, order_body, response_json, TestApp};
use dukkan_api::entities::DiscountType;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

async fn seed_catalog(app: &TestApp) -> (Uuid, Uuid) {
    let product_a = app.seed_product("Dallah Coffee Pot", dec!(10.000), 200).await;
    let product_b = app.seed_product("Oud Incense Set", dec!(5.000), 100).await;
    app.seed_country_rates("KW", "Kuwait", &[(dec!(1.000), dec!(2.000), dec!(0))])
        .await;
    (product_a.id, product_b.id)
}

async fn place_order(app: &TestApp, payload: Value) -> axum::response::Response {
    app.request(Method::POST, "/api/v1/orders", Some(payload)).await
}

// ==================== Amount math per type ====================

#[tokio::test]
async fn fixed_amount_subtracts_but_never_exceeds_the_cart() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    app.seed_discount_code(base_discount_request(
        "FLAT5",
        DiscountType::FixedAmount,
        dec!(5.000),
    ))
    .await;
    app.seed_discount_code(base_discount_request(
        "FLAT100",
        DiscountType::FixedAmount,
        dec!(100.000),
    ))
    .await;

    let body = response_json(
        place_order(&app, order_body(product_a, product_b, Some("FLAT5"))).await,
    )
    .await;
    assert_eq!(dec_field(&body["data"]["discount_amount"]), dec!(5.000));
    assert_eq!(dec_field(&body["data"]["total_amount"]), dec!(22.000));

    // An oversized fixed code clamps to the subtotal, leaving shipping.
    let mut payload = order_body(product_a, product_b, Some("FLAT100"));
    payload["customer"]["phone"] = json!("+96551110001");
    let body = response_json(place_order(&app, payload).await).await;
    assert_eq!(dec_field(&body["data"]["discount_amount"]), dec!(25.000));
    assert_eq!(dec_field(&body["data"]["total_amount"]), dec!(2.000));
}

#[tokio::test]
async fn percentage_codes_respect_the_cap() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    let mut request = base_discount_request("BIG50", DiscountType::Percentage, dec!(50));
    request.maximum_discount_amount = Some(dec!(5.000));
    app.seed_discount_code(request).await;

    let body = response_json(
        place_order(&app, order_body(product_a, product_b, Some("BIG50"))).await,
    )
    .await;
    // 50% of 25.000 is 12.500, capped at 5.000.
    assert_eq!(dec_field(&body["data"]["discount_amount"]), dec!(5.000));
    assert_eq!(dec_field(&body["data"]["total_amount"]), dec!(22.000));
}

#[tokio::test]
async fn free_shipping_codes_zero_the_shipping_only() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    app.seed_discount_code(base_discount_request(
        "SHIPFREE",
        DiscountType::FreeShipping,
        dec!(0),
    ))
    .await;

    let body = response_json(
        place_order(&app, order_body(product_a, product_b, Some("SHIPFREE"))).await,
    )
    .await;
    let order = &body["data"];
    assert_eq!(order["free_shipping"], json!(true));
    assert_eq!(dec_field(&order["discount_amount"]), dec!(0));
    assert_eq!(dec_field(&order["shipping_amount"]), dec!(0));
    assert_eq!(dec_field(&order["total_amount"]), dec!(25.000));
}

// ==================== Eligibility ====================

#[tokio::test]
async fn below_minimum_rejections_name_the_floor() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    let mut request = base_discount_request("SAVE10", DiscountType::Percentage, dec!(10));
    request.minimum_order_amount = Some(dec!(50.000));
    app.seed_discount_code(request).await;

    let response = place_order(&app, order_body(product_a, product_b, Some("SAVE10"))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("minimum"));
    assert!(body["details"].as_str().unwrap().contains("below_minimum"));
}

#[tokio::test]
async fn validity_windows_are_enforced() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;

    let mut expired = base_discount_request("EXPIRED", DiscountType::Percentage, dec!(10));
    expired.expires_at = Some(Utc::now() - Duration::days(1));
    app.seed_discount_code(expired).await;

    let mut future = base_discount_request("SOON", DiscountType::Percentage, dec!(10));
    future.starts_at = Some(Utc::now() + Duration::days(1));
    app.seed_discount_code(future).await;

    let response = place_order(&app, order_body(product_a, product_b, Some("EXPIRED"))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("expired"));

    let response = place_order(&app, order_body(product_a, product_b, Some("SOON"))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("not valid yet"));
}

#[tokio::test]
async fn unknown_and_deactivated_codes_are_refused() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    app.seed_discount_code(base_discount_request(
        "PAUSED",
        DiscountType::Percentage,
        dec!(10),
    ))
    .await;
    app.request(Method::POST, "/api/v1/discount-codes/PAUSED/deactivate", None)
        .await;

    let response = place_order(&app, order_body(product_a, product_b, Some("PAUSED"))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("not active"));

    let response = place_order(&app, order_body(product_a, product_b, Some("NOPE"))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn product_restricted_codes_discount_only_matching_lines() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    let mut request = base_discount_request("POTS10", DiscountType::Percentage, dec!(10));
    request.product_ids = vec![product_a];
    app.seed_discount_code(request).await;

    // Only the 2 x 10.000 line is eligible: 10% of 20.000.
    let body = response_json(
        place_order(&app, order_body(product_a, product_b, Some("POTS10"))).await,
    )
    .await;
    assert_eq!(dec_field(&body["data"]["discount_amount"]), dec!(2.000));
    assert_eq!(dec_field(&body["data"]["total_amount"]), dec!(25.000));

    // A cart with no eligible line is refused outright.
    let mut ineligible = order_body(product_b, product_b, Some("POTS10"));
    ineligible["customer"]["phone"] = json!("+96551110002");
    let response = place_order(&app, ineligible).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert!(body["details"].as_str().unwrap().contains("not_applicable"));
}

// ==================== Usage ceilings ====================

#[tokio::test]
async fn last_use_of_a_limited_code_goes_to_exactly_one_order() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    let mut request = base_discount_request("LAST1", DiscountType::Percentage, dec!(10));
    request.usage_limit = Some(1);
    app.seed_discount_code(request).await;

    let mut first = order_body(product_a, product_b, Some("LAST1"));
    first["customer"]["phone"] = json!("+96551110003");
    let mut second = order_body(product_a, product_b, Some("LAST1"));
    second["customer"]["phone"] = json!("+96551110004");

    let (r1, r2) = tokio::join!(place_order(&app, first), place_order(&app, second));
    let statuses = [r1.status(), r2.status()];

    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::CREATED)
            .count(),
        1,
        "exactly one order claims the last use, got {statuses:?}"
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::UNPROCESSABLE_ENTITY)
            .count(),
        1
    );

    // A third attempt sees the exhausted counter up front.
    let mut third = order_body(product_a, product_b, Some("LAST1"));
    third["customer"]["phone"] = json!("+96551110005");
    let response = place_order(&app, third).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("usage limit"));
}

#[tokio::test]
async fn per_customer_limit_binds_to_the_customer_not_the_code() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    let mut request = base_discount_request("ONEEACH", DiscountType::Percentage, dec!(10));
    request.usage_limit_per_customer = Some(1);
    app.seed_discount_code(request).await;

    let first = place_order(&app, order_body(product_a, product_b, Some("ONEEACH"))).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    // Same phone again: refused.
    let repeat = place_order(&app, order_body(product_a, product_b, Some("ONEEACH"))).await;
    assert_eq!(repeat.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(repeat).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("maximum number of times"));

    // A different customer still gets their use.
    let mut other = order_body(product_a, product_b, Some("ONEEACH"));
    other["customer"]["phone"] = json!("+96551110006");
    let response = place_order(&app, other).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The refused attempt left no order behind.
    let listing = response_json(app.request(Method::GET, "/api/v1/orders", None).await).await;
    assert_eq!(listing["data"]["total"], json!(2));
}

#[tokio::test]
async fn first_order_codes_reject_returning_customers() {
    let app = TestApp::new().await;
    let (product_a, product_b) = seed_catalog(&app).await;
    let mut request = base_discount_request("WELCOME", DiscountType::Percentage, dec!(10));
    request.first_time_customer_only = true;
    app.seed_discount_code(request).await;

    // The customer's first order, without any code.
    let plain = place_order(&app, order_body(product_a, product_b, None)).await;
    assert_eq!(plain.status(), StatusCode::CREATED);

    let returning = place_order(&app, order_body(product_a, product_b, Some("WELCOME"))).await;
    assert_eq!(returning.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(returning).await;
    assert!(body["message"].as_str().unwrap().contains("first order"));

    let mut fresh = order_body(product_a, product_b, Some("WELCOME"));
    fresh["customer"]["phone"] = json!("+96551110007");
    let response = place_order(&app, fresh).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

// ==================== Management endpoints ====================

#[tokio::test]
async fn codes_are_created_uppercase_and_fetched_case_insensitively() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/discount-codes",
            Some(json!({
                "code": "save10",
                "description": "Spring promotion",
                "discount_type": "percentage",
                "value": "10",
                "minimum_order_amount": "20.000",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["code"], json!("SAVE10"));
    assert_eq!(body["data"]["usage_count"], json!(0));
    assert_eq!(body["data"]["is_active"], json!(true));

    // Same code again collides regardless of case.
    let conflict = app
        .request(
            Method::POST,
            "/api/v1/discount-codes",
            Some(json!({
                "code": "SAVE10",
                "discount_type": "percentage",
                "value": "15",
            })),
        )
        .await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let fetched = response_json(
        app.request(Method::GET, "/api/v1/discount-codes/sAvE10", None)
            .await,
    )
    .await;
    assert_eq!(fetched["data"]["code"], json!("SAVE10"));

    let listed = response_json(
        app.request(Method::GET, "/api/v1/discount-codes", None).await,
    )
    .await;
    assert_eq!(listed["data"]["total"], json!(1));
}

#[tokio::test]
async fn percentage_over_one_hundred_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/discount-codes",
            Some(json!({
                "code": "TOOMUCH",
                "discount_type": "percentage",
                "value": "150",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn duplicate_clones_the_rules_under_a_new_code() {
    let app = TestApp::new().await;
    let mut request = base_discount_request("SAVE10", DiscountType::Percentage, dec!(10));
    request.minimum_order_amount = Some(dec!(20.000));
    app.seed_discount_code(request).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/discount-codes/SAVE10/duplicate",
            Some(json!({ "new_code": "save10-feb" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    let clone = &body["data"];
    assert_eq!(clone["code"], json!("SAVE10-FEB"));
    assert_eq!(clone["discount_type"], json!("percentage"));
    assert_eq!(dec_field(&clone["value"]), dec!(10));
    assert_eq!(dec_field(&clone["minimum_order_amount"]), dec!(20.000));
    assert_eq!(clone["usage_count"], json!(0));

    // Cloning onto an existing code collides.
    let conflict = app
        .request(
            Method::POST,
            "/api/v1/discount-codes/SAVE10/duplicate",
            Some(json!({ "new_code": "SAVE10-FEB" })),
        )
        .await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn deactivation_is_idempotent() {
    let app = TestApp::new().await;
    app.seed_discount_code(base_discount_request(
        "PAUSE",
        DiscountType::Percentage,
        dec!(10),
    ))
    .await;

    let first = response_json(
        app.request(Method::POST, "/api/v1/discount-codes/PAUSE/deactivate", None)
            .await,
    )
    .await;
    assert_eq!(first["data"]["is_active"], json!(false));

    let second = response_json(
        app.request(Method::POST, "/api/v1/discount-codes/PAUSE/deactivate", None)
            .await,
    )
    .await;
    assert_eq!(second["data"]["is_active"], json!(false));

    let missing = app
        .request(Method::POST, "/api/v1/discount-codes/GHOST/deactivate", None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
