use actix_web::{http::StatusCode, test, web, App};
use retail_order_engine::{
    events::EventProducers,
    traits::{OrderFlowError, SettleAttempt},
    OrderFlowApi,
};
use ros_common::Secret;
use serde_json::{json, Value};

use super::{
    fixtures::{pending_order, settled_order},
    mocks::MockFlowDb,
};
use crate::{helpers::calculate_hmac, middleware::HmacMiddlewareFactory, webhook_routes::payment_webhook};

fn webhook_body(narration: &str, amount: i64) -> Value {
    json!({
        "transaction_id": "tx-1",
        "gateway": "acmebank",
        "direction": "in",
        "transferred_amount": amount,
        "content": narration
    })
}

async fn post_webhook(db: MockFlowDb, body: Value) -> (StatusCode, Value) {
    let _ = env_logger::try_init();
    let api = OrderFlowApi::new(db, EventProducers::default());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .route("/webhook/payment", web::post().to(payment_webhook::<MockFlowDb>)),
    )
    .await;
    let req = test::TestRequest::post().uri("/webhook/payment").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap_or(Value::Null);
    (status, body)
}

#[actix_web::test]
async fn a_matching_payment_settles_the_order() {
    let order = pending_order();
    let narration = format!("ORD-{}", order.order_id.as_str());
    let mut db = MockFlowDb::new();
    db.expect_record_payment_event().returning(|_| Ok(true));
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(pending_order())));
    db.expect_try_settle_order().returning(|_, _| Ok(SettleAttempt::Settled(settled_order("tx-1"))));
    db.expect_finalize_payment_event().returning(|_, _, _| Ok(()));
    let (status, body) = post_webhook(db, webhook_body(&narration, 200_000)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["outcome"], json!("settled"));
}

#[actix_web::test]
async fn duplicate_deliveries_are_acknowledged_without_a_second_settlement() {
    let order = settled_order("tx-1");
    let narration = format!("ORD-{}", order.order_id.as_str());
    let mut db = MockFlowDb::new();
    db.expect_record_payment_event().returning(|_| Ok(false));
    // the order already carries its settlement; try_settle_order has no expectation and must not be reached
    db.expect_fetch_order_by_order_id().returning(move |_| Ok(Some(settled_order("tx-1"))));
    db.expect_finalize_payment_event().returning(|_, _, _| Ok(()));
    let (status, body) = post_webhook(db, webhook_body(&narration, 200_000)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["outcome"], json!("already_settled"));
}

#[actix_web::test]
async fn short_payments_are_acknowledged_and_change_nothing() {
    let order = pending_order();
    let narration = format!("ORD-{}", order.order_id.as_str());
    let mut db = MockFlowDb::new();
    db.expect_record_payment_event().returning(|_| Ok(true));
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(pending_order())));
    db.expect_finalize_payment_event().returning(|_, _, _| Ok(()));
    let (status, body) = post_webhook(db, webhook_body(&narration, 150_000)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], json!("insufficient_amount"));
}

#[actix_web::test]
async fn unrelated_transfers_are_acknowledged_as_unattributed() {
    let mut db = MockFlowDb::new();
    db.expect_record_payment_event().returning(|_| Ok(true));
    db.expect_finalize_payment_event().returning(|_, _, _| Ok(()));
    let (status, body) = post_webhook(db, webhook_body("monthly rent", 42_000)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["outcome"], json!("unattributed"));
}

#[actix_web::test]
async fn storage_failures_ask_the_gateway_to_retry() {
    let mut db = MockFlowDb::new();
    db.expect_record_payment_event()
        .returning(|_| Err(OrderFlowError::DatabaseError("database is locked".into())));
    let (status, body) = post_webhook(db, webhook_body("ORD-whatever", 10_000)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], Value::Bool(false));
}

// ------------------------------------------  HMAC middleware  ------------------------------------------------

async fn post_signed(signature: Option<String>, body: &Value) -> StatusCode {
    let _ = env_logger::try_init();
    let mut db = MockFlowDb::new();
    db.expect_record_payment_event().returning(|_| Ok(true));
    db.expect_finalize_payment_event().returning(|_, _, _| Ok(()));
    let api = OrderFlowApi::new(db, EventProducers::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(api)).service(
            web::scope("/webhook")
                .wrap(HmacMiddlewareFactory::new(
                    "x-payment-signature",
                    Secret::new("webhook-secret".to_string()),
                    true,
                ))
                .route("/payment", web::post().to(payment_webhook::<MockFlowDb>)),
        ),
    )
    .await;
    let payload = serde_json::to_vec(body).expect("Serialization failed");
    let mut req = test::TestRequest::post()
        .uri("/webhook/payment")
        .insert_header(("content-type", "application/json"))
        .set_payload(payload);
    if let Some(sig) = signature {
        req = req.insert_header(("x-payment-signature", sig));
    }
    test::call_service(&app, req.to_request()).await.status()
}

#[actix_web::test]
async fn correctly_signed_webhooks_are_accepted() {
    let body = webhook_body("monthly rent", 42_000);
    let payload = serde_json::to_vec(&body).expect("Serialization failed");
    let sig = calculate_hmac("webhook-secret", &payload);
    assert_eq!(post_signed(Some(sig), &body).await, StatusCode::OK);
}

#[actix_web::test]
async fn missigned_webhooks_are_rejected() {
    let body = webhook_body("monthly rent", 42_000);
    assert_eq!(post_signed(Some("bm90IGEgcmVhbCBzaWduYXR1cmU=".into()), &body).await, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let body = webhook_body("monthly rent", 42_000);
    assert_eq!(post_signed(None, &body).await, StatusCode::FORBIDDEN);
}
