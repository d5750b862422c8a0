use actix_web::{http::StatusCode, test, web, App};
use retail_order_engine::{
    db_types::Money,
    events::EventProducers,
    order_objects::CheckoutReceipt,
    traits::CheckoutError,
    CheckoutApi,
};
use serde_json::{json, Value};

use super::{
    fixtures::{cart_line, pending_order},
    mocks::MockCheckoutDb,
};
use crate::routes::checkout;

fn checkout_body() -> Value {
    json!({
        "shipping": { "recipient": "Alex Doe", "phone": "555-0100", "address": "12 Main St" }
    })
}

async fn post_checkout(db: MockCheckoutDb, buyer: Option<&str>, body: Value) -> (StatusCode, Value) {
    let _ = env_logger::try_init();
    let api = CheckoutApi::new(db, EventProducers::default());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .route("/checkout", web::post().to(checkout::<MockCheckoutDb>)),
    )
    .await;
    let mut req = test::TestRequest::post().uri("/checkout").set_json(&body);
    if let Some(buyer) = buyer {
        req = req.insert_header(("x-buyer-id", buyer));
    }
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap_or(Value::Null);
    (status, body)
}

#[actix_web::test]
async fn checkout_requires_a_buyer_identity() {
    let db = MockCheckoutDb::new();
    let (status, _body) = post_checkout(db, None, checkout_body()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn checkout_creates_a_pending_order() {
    let mut db = MockCheckoutDb::new();
    db.expect_cart_snapshot().returning(|_| Ok(vec![cart_line()]));
    db.expect_insert_order().returning(|_, _| Ok(pending_order()));
    let (status, body) = post_checkout(db, Some("cust-1001"), checkout_body()).await;
    assert_eq!(status, StatusCode::OK);
    let receipt: CheckoutReceipt = serde_json::from_value(body.clone()).expect("Malformed checkout response");
    assert_eq!(receipt.order.total, Money::from(200_000));
    assert!(receipt.discount_warning.is_none());
    assert_eq!(body["total_mismatch"], Value::Bool(false));
}

#[actix_web::test]
async fn unknown_promotion_codes_warn_but_do_not_block() {
    let mut db = MockCheckoutDb::new();
    db.expect_cart_snapshot().returning(|_| Ok(vec![cart_line()]));
    db.expect_fetch_promotion().returning(|_| Ok(None));
    db.expect_insert_order().returning(|_, _| Ok(pending_order()));
    let mut body = checkout_body();
    body["promotion_code"] = json!("NOSUCHCODE");
    let (status, body) = post_checkout(db, Some("cust-1001"), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discount_warning"]["reason"], json!("not_found"));
}

#[actix_web::test]
async fn an_empty_cart_is_a_client_error() {
    let mut db = MockCheckoutDb::new();
    db.expect_cart_snapshot().returning(|_| Err(CheckoutError::EmptyCart));
    let (status, body) = post_checkout(db, Some("cust-1001"), checkout_body()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("cart is empty"));
}

#[actix_web::test]
async fn missing_shipping_fields_are_a_client_error() {
    // validation fails before any database call, so the mock carries no expectations
    let db = MockCheckoutDb::new();
    let mut body = checkout_body();
    body["shipping"]["phone"] = json!("");
    let (status, body) = post_checkout(db, Some("cust-1001"), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("phone"));
}

#[actix_web::test]
async fn client_declared_totals_are_cross_checked_not_trusted() {
    let mut db = MockCheckoutDb::new();
    db.expect_cart_snapshot().returning(|_| Ok(vec![cart_line()]));
    db.expect_insert_order().returning(|_, _| Ok(pending_order()));
    let mut body = checkout_body();
    body["expected_total"] = json!(150_000);
    let (status, body) = post_checkout(db, Some("cust-1001"), body).await;
    assert_eq!(status, StatusCode::OK);
    // the order keeps the server-computed total; the mismatch is only flagged
    assert_eq!(body["order"]["total"], json!(200_000));
    assert_eq!(body["total_mismatch"], Value::Bool(true));
}
