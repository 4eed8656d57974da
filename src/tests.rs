// Router tests for the storefront API
// Every request goes through the real router, extractors and error mapping;
// storage and the payment gateway are the in-memory doubles.

use super::*;
use std::str::FromStr;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Role;
use crate::coupons::CouponKind;
use crate::memory::{MemoryStore, MockGateway};
use crate::orders::{OrderStatus, PaymentStatus};
use crate::payments::signature;

const JWT_SECRET: &str = "router-test-secret";
const KEY_SECRET: &str = "key_secret";
const WEBHOOK_SECRET: &str = "webhook_secret";

// ============================================================================
// Test Helpers
// ============================================================================

struct TestApp {
    server: TestServer,
    store: MemoryStore,
    gateway: Arc<MockGateway>,
    tokens: Arc<TokenService>,
}

impl TestApp {
    fn token(&self, user_id: i32, role: Role) -> HeaderValue {
        let token = self
            .tokens
            .generate_access_token(user_id, &format!("user{}@example.com", user_id), role)
            .unwrap();
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    fn customer(&self, user_id: i32) -> HeaderValue {
        self.token(user_id, Role::User)
    }

    fn admin(&self) -> HeaderValue {
        self.token(999, Role::Admin)
    }
}

/// Helper function to create a test app over a fresh in-memory store
fn create_test_app() -> TestApp {
    let store = MemoryStore::new();
    let gateway = Arc::new(MockGateway::new(KEY_SECRET, WEBHOOK_SECRET));
    let tokens = Arc::new(TokenService::new(JWT_SECRET.to_string()));
    let shared = Arc::new(store.clone());

    let order_service = Arc::new(OrderService::new(
        shared.clone(),
        shared.clone(),
        shared.clone(),
        shared.clone(),
        shared.clone(),
        gateway.clone(),
    ));
    let state = AppState {
        order_service,
        catalog: shared.clone(),
        coupons: shared.clone(),
        settings: shared,
        tokens: tokens.clone(),
    };

    TestApp {
        server: TestServer::new(create_router(state)).unwrap(),
        store,
        gateway,
        tokens,
    }
}

fn order_payload(product_id: Uuid, quantity: i32, payment_method: &str, coupon: Option<&str>) -> Value {
    json!({
        "items": [{
            "product_id": product_id,
            "quantity": quantity,
            "size": "M",
            "color": "Black"
        }],
        "shipping_address": {
            "full_name": "Asha Rao",
            "phone": "+919876543210",
            "line1": "12 MG Road",
            "city": "Pune",
            "state": "Maharashtra",
            "postal_code": "411001"
        },
        "payment_method": payment_method,
        "coupon_code": coupon
    })
}

fn money(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

fn order_id(body: &Value) -> Uuid {
    Uuid::parse_str(body["order"]["id"].as_str().unwrap()).unwrap()
}

fn assert_status(response: &TestResponse, expected: StatusCode) {
    let status = response.status_code();
    if status != expected {
        eprintln!("Response body: {}", response.text());
        panic!("Expected {}, got {}", expected, status);
    }
}

async fn place_order(app: &TestApp, user_id: i32, product_id: Uuid, quantity: i32, method: &str) -> Value {
    let response = app
        .server
        .post("/api/orders")
        .add_header(header::AUTHORIZATION, app.customer(user_id))
        .json(&order_payload(product_id, quantity, method, None))
        .await;
    assert_status(&response, StatusCode::CREATED);
    response.json()
}

// ============================================================================
// Order creation (POST /api/orders)
// ============================================================================

#[tokio::test]
async fn test_create_cod_order_reserves_stock() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);

    let body = place_order(&app, 1, product, 2, "cod").await;

    assert_eq!(body["order"]["status"], "confirmed");
    assert_eq!(money(&body["order"]["subtotal"]), dec!(2000));
    assert_eq!(money(&body["order"]["total"]), dec!(2050));
    assert!(body["order"]["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert!(body.get("payment_intent").is_none());
    assert_eq!(app.store.stock(product, "M", "Black"), 8);
}

#[tokio::test]
async fn test_create_gateway_order_returns_intent() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);

    let body = place_order(&app, 1, product, 2, "gateway").await;

    assert_eq!(body["order"]["status"], "pending");
    assert_eq!(body["order"]["payment"]["status"], "pending");
    assert_eq!(body["payment_intent"]["amount"], 205000);
    assert_eq!(
        body["payment_intent"]["intent_id"],
        body["order"]["payment"]["gateway_order_id"]
    );
    // Nothing is held until the payment is confirmed
    assert_eq!(app.store.stock(product, "M", "Black"), 10);
}

#[tokio::test]
async fn test_create_order_requires_token() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);

    let response = app
        .server
        .post("/api/orders")
        .json(&order_payload(product, 1, "cod", None))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_create_order_with_insufficient_stock() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 1)]);

    let response = app
        .server
        .post("/api/orders")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&order_payload(product, 3, "cod", None))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "INSUFFICIENT_STOCK");
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_create_order_with_empty_cart() {
    let app = create_test_app();
    let mut payload = order_payload(Uuid::new_v4(), 1, "cod", None);
    payload["items"] = json!([]);

    let response = app
        .server
        .post("/api/orders")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("at least one item"));
}

#[tokio::test]
async fn test_gateway_outage_creates_nothing() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    app.gateway.fail_intents(true);

    let response = app
        .server
        .post("/api/orders")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&order_payload(product, 1, "gateway", None))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.store.order_count(), 0);
}

// ============================================================================
// Payment confirmation (POST /api/payments/confirm, /api/payments/webhook)
// ============================================================================

#[tokio::test]
async fn test_confirm_payment_marks_order_paid() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 2, "gateway").await;
    let intent = body["order"]["payment"]["gateway_order_id"].as_str().unwrap().to_string();
    let payload = json!({
        "gateway_order_id": intent,
        "gateway_payment_id": "pay_001",
        "gateway_signature": signature::sign(KEY_SECRET, signature::payment_message(&intent, "pay_001").as_bytes())
    });

    let response = app
        .server
        .post("/api/payments/confirm")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&payload)
        .await;
    assert_status(&response, StatusCode::OK);
    let confirmed: Value = response.json();
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["payment"]["status"], "paid");
    // The signature is stored but never echoed back
    assert!(confirmed["payment"].get("gateway_signature").is_none());

    // A retried confirmation succeeds without reserving twice
    let retry = app
        .server
        .post("/api/payments/confirm")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&payload)
        .await;
    assert_eq!(retry.status_code(), StatusCode::OK);
    assert_eq!(app.store.stock(product, "M", "Black"), 8);
}

#[tokio::test]
async fn test_confirm_payment_with_bad_signature() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 1, "gateway").await;
    let id = order_id(&body);

    let response = app
        .server
        .post("/api/payments/confirm")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&json!({
            "gateway_order_id": body["order"]["payment"]["gateway_order_id"],
            "gateway_payment_id": "pay_forged",
            "gateway_signature": "00ff"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let error: Value = response.json();
    assert_eq!(error["error_code"], "SIGNATURE_INVALID");
    let stored = app.store.order(id);
    assert_eq!(stored.payment.status, PaymentStatus::Failed);
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(app.store.stock(product, "M", "Black"), 10);
}

#[tokio::test]
async fn test_webhook_capture_confirms_order() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 1, "gateway").await;
    let event = json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_hook",
            "order_id": body["order"]["payment"]["gateway_order_id"]
        } } }
    })
    .to_string();
    let signature_header = HeaderValue::from_str(&signature::sign(WEBHOOK_SECRET, event.as_bytes())).unwrap();

    let response = app
        .server
        .post("/api/payments/webhook")
        .add_header(HeaderName::from_static("x-razorpay-signature"), signature_header)
        .text(event)
        .await;

    assert_status(&response, StatusCode::OK);
    let ack: Value = response.json();
    assert_eq!(ack["event"], "payment.captured");
    assert_eq!(ack["handled"], true);
    assert_eq!(app.store.order(order_id(&body)).payment.status, PaymentStatus::Paid);
    assert_eq!(app.store.stock(product, "M", "Black"), 9);
}

#[tokio::test]
async fn test_webhook_without_signature_is_rejected() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/payments/webhook")
        .text(r#"{"event":"payment.captured"}"#)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_acknowledges_unknown_events() {
    let app = create_test_app();
    let event = r#"{"event":"refund.processed","payload":{}}"#;
    let signature_header = HeaderValue::from_str(&signature::sign(WEBHOOK_SECRET, event.as_bytes())).unwrap();

    let response = app
        .server
        .post("/api/payments/webhook")
        .add_header(HeaderName::from_static("x-razorpay-signature"), signature_header)
        .text(event)
        .await;

    assert_status(&response, StatusCode::OK);
    let ack: Value = response.json();
    assert_eq!(ack["handled"], false);
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_acknowledged() {
    let app = create_test_app();
    let event = json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": { "id": "pay_other", "order_id": "order_other_shop" } } }
    })
    .to_string();
    let signature_header = HeaderValue::from_str(&signature::sign(WEBHOOK_SECRET, event.as_bytes())).unwrap();

    let response = app
        .server
        .post("/api/payments/webhook")
        .add_header(HeaderName::from_static("x-razorpay-signature"), signature_header)
        .text(event)
        .await;

    assert_status(&response, StatusCode::OK);
    let ack: Value = response.json();
    assert_eq!(ack["event"], "payment.captured");
    assert_eq!(ack["handled"], false);
}

// ============================================================================
// Order reads (GET /api/orders, GET /api/orders/:id)
// ============================================================================

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 1, "cod").await;
    let path = format!("/api/orders/{}", order_id(&body));

    let owner = app.server.get(&path).add_header(header::AUTHORIZATION, app.customer(1)).await;
    assert_eq!(owner.status_code(), StatusCode::OK);

    let stranger = app.server.get(&path).add_header(header::AUTHORIZATION, app.customer(2)).await;
    assert_eq!(stranger.status_code(), StatusCode::FORBIDDEN);

    let admin = app.server.get(&path).add_header(header::AUTHORIZATION, app.admin()).await;
    assert_eq!(admin.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_missing_order() {
    let app = create_test_app();

    let response = app
        .server
        .get(&format!("/api/orders/{}", Uuid::new_v4()))
        .add_header(header::AUTHORIZATION, app.customer(1))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_history_filters_by_status() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    place_order(&app, 1, product, 1, "cod").await;
    place_order(&app, 1, product, 1, "gateway").await;
    place_order(&app, 2, product, 1, "cod").await;

    let all = app
        .server
        .get("/api/orders")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .await;
    assert_eq!(all.status_code(), StatusCode::OK);
    assert_eq!(all.json::<Vec<Value>>().len(), 2);

    let pending = app
        .server
        .get("/api/orders")
        .add_query_param("status", "pending")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .await;
    let pending: Vec<Value> = pending.json();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["payment"]["method"], "gateway");
}

// ============================================================================
// Cancellation and admin status updates
// ============================================================================

#[tokio::test]
async fn test_cancel_order_without_body_restores_stock() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 3, "cod").await;
    let path = format!("/api/orders/{}/cancel", order_id(&body));

    let response = app.server.post(&path).add_header(header::AUTHORIZATION, app.customer(1)).await;

    assert_status(&response, StatusCode::OK);
    let cancelled: Value = response.json();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(app.store.stock(product, "M", "Black"), 10);

    // Cancelling again is a no-op
    let again = app.server.post(&path).add_header(header::AUTHORIZATION, app.customer(1)).await;
    assert_eq!(again.status_code(), StatusCode::OK);
    assert_eq!(app.store.stock(product, "M", "Black"), 10);
}

#[tokio::test]
async fn test_cancel_paid_order_refunds_payment() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 1, "gateway").await;
    let intent = body["order"]["payment"]["gateway_order_id"].as_str().unwrap().to_string();
    let confirm = app
        .server
        .post("/api/payments/confirm")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&json!({
            "gateway_order_id": intent,
            "gateway_payment_id": "pay_002",
            "gateway_signature": signature::sign(KEY_SECRET, signature::payment_message(&intent, "pay_002").as_bytes())
        }))
        .await;
    assert_status(&confirm, StatusCode::OK);

    let response = app
        .server
        .post(&format!("/api/orders/{}/cancel", order_id(&body)))
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&json!({ "reason": "Ordered the wrong size" }))
        .await;

    assert_status(&response, StatusCode::OK);
    let cancelled: Value = response.json();
    assert_eq!(cancelled["payment"]["status"], "refunded");
    assert_eq!(cancelled["cancellation_reason"], "Ordered the wrong size");
    assert_eq!(app.gateway.refunds(), vec![("pay_002".to_string(), dec!(1050))]);
}

#[tokio::test]
async fn test_status_update_requires_admin() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 1, "cod").await;

    let response = app
        .server
        .patch(&format!("/api/admin/orders/{}/status", order_id(&body)))
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&json!({ "status": "shipped" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_shipped_order_cannot_be_cancelled() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let body = place_order(&app, 1, product, 1, "cod").await;
    let id = order_id(&body);

    let shipped = app
        .server
        .patch(&format!("/api/admin/orders/{}/status", id))
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({ "status": "shipped", "tracking_number": "TRK123" }))
        .await;
    assert_status(&shipped, StatusCode::OK);
    let shipped: Value = shipped.json();
    assert_eq!(shipped["tracking_number"], "TRK123");
    assert!(!shipped["timestamps"]["shipped_at"].is_null());

    let cancel = app
        .server
        .post(&format!("/api/orders/{}/cancel", id))
        .add_header(header::AUTHORIZATION, app.customer(1))
        .await;
    assert_eq!(cancel.status_code(), StatusCode::CONFLICT);

    let back = app
        .server
        .patch(&format!("/api/admin/orders/{}/status", id))
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({ "status": "pending" }))
        .await;
    assert_eq!(back.status_code(), StatusCode::CONFLICT);
}

// ============================================================================
// Coupons
// ============================================================================

#[tokio::test]
async fn test_apply_coupon_previews_without_reserving() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    app.store.seed_coupon(
        "SAVE10",
        CouponKind::Percentage {
            percent: dec!(10),
            maximum_discount_amount: None,
        },
    );
    let mut payload = order_payload(product, 2, "cod", Some("save10"));
    payload.as_object_mut().unwrap().remove("payment_method");

    let response = app
        .server
        .post("/api/coupons/apply")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&payload)
        .await;

    assert_status(&response, StatusCode::OK);
    let calculation: Value = response.json();
    assert_eq!(money(&calculation["discount"]), dec!(200));
    assert_eq!(money(&calculation["total"]), dec!(1850));
    assert_eq!(calculation["coupon"]["code"], "SAVE10");
    assert_eq!(app.store.stock(product, "M", "Black"), 10);
    assert_eq!(app.store.coupon_usage("SAVE10", 1), (0, 0));
}

#[tokio::test]
async fn test_apply_unknown_coupon() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);
    let mut payload = order_payload(product, 1, "cod", Some("NOPE"));
    payload.as_object_mut().unwrap().remove("payment_method");

    let response = app
        .server
        .post("/api/coupons/apply")
        .add_header(header::AUTHORIZATION, app.customer(1))
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "INVALID_COUPON");
}

#[tokio::test]
async fn test_list_coupons_shows_public_only() {
    let app = create_test_app();
    app.store.seed_coupon("FREESHIP", CouponKind::FreeShipping);
    app.store
        .update_coupon("STAFF50", CouponKind::FixedAmount { amount: dec!(50) }, |c| {
            c.is_public = false
        });

    let response = app.server.get("/api/coupons").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let coupons: Vec<Value> = response.json();
    assert_eq!(coupons.len(), 1);
    assert_eq!(coupons[0]["code"], "FREESHIP");
}

#[tokio::test]
async fn test_admin_creates_coupon_once() {
    let app = create_test_app();
    let payload = json!({
        "code": "WELCOME10",
        "discount_type": "percentage",
        "discount_value": "10",
        "maximum_discount_amount": "300",
        "valid_from": "2026-01-01T00:00:00Z",
        "valid_until": "2027-01-01T00:00:00Z",
        "is_public": true
    });

    let created = app
        .server
        .post("/api/admin/coupons")
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&payload)
        .await;
    assert_status(&created, StatusCode::CREATED);
    let coupon: Value = created.json();
    assert_eq!(coupon["code"], "WELCOME10");
    assert_eq!(coupon["discount_type"], "percentage");

    let duplicate = app
        .server
        .post("/api/admin/coupons")
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&payload)
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_coupon_with_inverted_window_is_rejected() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/admin/coupons")
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({
            "code": "BACKWARDS",
            "discount_type": "fixed_amount",
            "discount_value": "100",
            "valid_from": "2027-01-01T00:00:00Z",
            "valid_until": "2026-01-01T00:00:00Z"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Settings and catalog
// ============================================================================

#[tokio::test]
async fn test_default_delivery_charge_setting_is_used() {
    let app = create_test_app();
    let product = app.store.seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10)]);

    let put = app
        .server
        .put("/api/admin/settings/delivery.default_charge")
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({ "value": "80" }))
        .await;
    assert_status(&put, StatusCode::OK);

    let get = app
        .server
        .get("/api/admin/settings/delivery.default_charge")
        .add_header(header::AUTHORIZATION, app.admin())
        .await;
    let setting: Value = get.json();
    assert_eq!(setting["value"], "80");

    let body = place_order(&app, 1, product, 1, "cod").await;
    assert_eq!(money(&body["order"]["delivery_charge"]), dec!(80));
}

#[tokio::test]
async fn test_invalid_setting_value_is_rejected() {
    let app = create_test_app();

    let response = app
        .server
        .put("/api/admin/settings/delivery.default_charge")
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({ "value": "free" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_sets_variant_stock() {
    let app = create_test_app();
    let product = app
        .store
        .seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10), ("L", "Black", 4)]);

    let response = app
        .server
        .put(&format!("/api/admin/products/{}/stock", product))
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({ "size": "M", "color": "Black", "stock": 2 }))
        .await;

    assert_status(&response, StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["stock"], 2);
    assert_eq!(body["total_stock"], 6);
    assert_eq!(app.store.product_total_stock(product), 6);

    let missing = app
        .server
        .put(&format!("/api/admin/products/{}/stock", product))
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({ "size": "XL", "color": "Black", "stock": 2 }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_variant_stock_update_keeps_reservations_on_other_variants() {
    let app = create_test_app();
    let product = app
        .store
        .seed_product("Basic Tee", dec!(1000), &[("M", "Black", 10), ("L", "Black", 4)]);
    place_order(&app, 1, product, 3, "cod").await;

    let response = app
        .server
        .put(&format!("/api/admin/products/{}/stock", product))
        .add_header(header::AUTHORIZATION, app.admin())
        .json(&json!({ "size": "l", "color": "black", "stock": 9 }))
        .await;

    assert_status(&response, StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["stock"], 9);
    assert_eq!(body["total_stock"], 16);
    assert_eq!(app.store.stock(product, "M", "Black"), 7);
    assert_eq!(app.store.product_total_stock(product), 16);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = create_test_app();

    let response = app.server.get("/api-docs/openapi.json").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let doc: Value = response.json();
    assert!(doc["paths"].get("/api/orders").is_some());
    assert!(doc["paths"].get("/api/payments/webhook").is_some());
    assert!(doc["components"]["securitySchemes"].get("bearer_auth").is_some());
}
