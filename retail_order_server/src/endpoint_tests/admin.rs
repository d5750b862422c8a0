use actix_web::{http::StatusCode, test, web, App};
use retail_order_engine::{
    db_types::OrderStatusType,
    events::EventProducers,
    traits::{OrderChanged, SettleAttempt},
    OrderFlowApi,
    OrderQueryApi,
};
use ros_common::Secret;
use serde_json::{json, Value};

use super::{
    fixtures::{pending_order, settled_order},
    mocks::{MockFlowDb, MockQueryDb},
};
use crate::{
    middleware::ApiKeyMiddlewareFactory,
    routes::{mark_order_paid, search_orders, update_order_status},
};

const ORDER_ID: &str = "018f6a5e-93d2-4b8a-a8e1-55c3a9d0f1b2";

async fn post_status_update(db: MockFlowDb, new_status: &str) -> (StatusCode, Value) {
    let _ = env_logger::try_init();
    let api = OrderFlowApi::new(db, EventProducers::default());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .route("/orders/{id}/status", web::post().to(update_order_status::<MockFlowDb>)),
    )
    .await;
    let req = test::TestRequest::post()
        .uri(&format!("/orders/{ORDER_ID}/status"))
        .set_json(json!({ "status": new_status }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap_or(Value::Null);
    (status, body)
}

#[actix_web::test]
async fn forward_status_overrides_succeed() {
    let mut db = MockFlowDb::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(pending_order())));
    db.expect_update_order_status().returning(|_, status| {
        let mut order = pending_order();
        order.status = status;
        Ok(OrderChanged { old_status: OrderStatusType::Pending, order })
    });
    let (status, body) = post_status_update(db, "Shipped").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("Shipped"));
}

#[actix_web::test]
async fn completed_orders_cannot_be_reset_to_pending() {
    let mut db = MockFlowDb::new();
    // update_order_status carries no expectation: the transition must be refused before any write
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(settled_order("tx-1"))));
    let (status, _body) = post_status_update(db, "Pending").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn self_transitions_are_a_no_op_error() {
    let mut db = MockFlowDb::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(pending_order())));
    let (status, _body) = post_status_update(db, "Pending").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn manual_settlement_flows_through_reconciliation() {
    let mut db = MockFlowDb::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(pending_order())));
    db.expect_record_payment_event().returning(|_| Ok(true));
    db.expect_try_settle_order().returning(|_, settlement| {
        assert_eq!(settlement.gateway, "manual");
        Ok(SettleAttempt::Settled(settled_order(&settlement.txid)))
    });
    db.expect_finalize_payment_event().returning(|_, _, _| Ok(()));

    let api = OrderFlowApi::new(db, EventProducers::default());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .route("/orders/{id}/mark_paid", web::post().to(mark_order_paid::<MockFlowDb>)),
    )
    .await;
    let req = test::TestRequest::post()
        .uri(&format!("/orders/{ORDER_ID}/mark_paid"))
        .set_json(json!({ "reason": "paid cash on delivery" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap_or(Value::Null);
    assert_eq!(body["outcome"], json!("settled"));
}

// -----------------------------------------  API key middleware  ----------------------------------------------

async fn get_orders_with_key(key: Option<&str>) -> StatusCode {
    let _ = env_logger::try_init();
    let mut db = MockQueryDb::new();
    db.expect_search_orders().returning(|_, _| Ok(vec![pending_order()]));
    let api = OrderQueryApi::new(db);
    let app = test::init_service(
        App::new().app_data(web::Data::new(api)).service(
            web::scope("/api")
                .wrap(ApiKeyMiddlewareFactory::new("x-api-key", Secret::new("admin-key".to_string())))
                .route("/orders", web::get().to(search_orders::<MockQueryDb>)),
        ),
    )
    .await;
    let mut req = test::TestRequest::get().uri("/api/orders");
    if let Some(key) = key {
        req = req.insert_header(("x-api-key", key));
    }
    test::call_service(&app, req.to_request()).await.status()
}

#[actix_web::test]
async fn admin_reads_require_the_right_key() {
    assert_eq!(get_orders_with_key(Some("admin-key")).await, StatusCode::OK);
    assert_eq!(get_orders_with_key(Some("wrong-key")).await, StatusCode::FORBIDDEN);
    assert_eq!(get_orders_with_key(None).await, StatusCode::FORBIDDEN);
}
