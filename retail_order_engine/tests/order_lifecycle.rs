//! End-to-end order lifecycle tests against an in-memory SQLite database: checkout, discount application, payment
//! reconciliation, idempotent settlement, and the admin override paths.
use chrono::{Duration, Utc};
use retail_order_engine::{
    db_types::{
        BuyerId,
        DiscountKind,
        Money,
        NewPaymentEvent,
        OrderId,
        OrderStatusType,
        ShippingInfo,
        TransferDirection,
    },
    events::EventProducers,
    helpers::{payment_reference, DiscountRejection},
    order_objects::{OrderQueryFilter, Pagination},
    payment_objects::ReconciliationOutcome,
    sqlite::db::promotions::NewPromotion,
    traits::{CheckoutError, OrderFlowError},
    CheckoutApi,
    CheckoutRequest,
    OrderFlowApi,
    OrderQueryApi,
    SqliteDatabase,
};

const CUSTOMER: &str = "cust-1001";

async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating in-memory database")
}

fn shipping() -> ShippingInfo {
    ShippingInfo { recipient: "Alex Doe".into(), phone: "555-0100".into(), address: "12 Main St".into() }
}

fn checkout_request(promotion_code: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        customer_id: CUSTOMER.into(),
        shipping: shipping(),
        promotion_code: promotion_code.map(String::from),
        payment_method: Default::default(),
    }
}

fn transfer(txid: &str, amount: i64, narration: &str) -> NewPaymentEvent {
    NewPaymentEvent {
        txid: txid.into(),
        gateway: "acmebank".into(),
        direction: TransferDirection::Inbound,
        amount: Money::from(amount),
        narration: Some(narration.into()),
        reference: None,
        occurred_at: Utc::now(),
    }
}

/// Seeds one product at 1000.00 and puts two of it in the customer's cart.
async fn seed_cart(db: &SqliteDatabase) -> i64 {
    db.upsert_customer(CUSTOMER, "Alex Doe").await.expect("Error seeding customer");
    let product_id =
        db.insert_product("Canvas sneaker", Some("/img/sneaker.png"), Money::from(100_000)).await.expect("Error seeding product");
    db.add_cart_line(CUSTOMER, product_id, 2, Some("42")).await.expect("Error seeding cart");
    product_id
}

async fn seed_save10(db: &SqliteDatabase) -> i64 {
    db.insert_promotion(&NewPromotion {
        code: Some("SAVE10"),
        name: None,
        discount_kind: DiscountKind::Percentage,
        value: 10,
        max_discount: None,
        min_order_amount: Money::from(50_000),
        valid_from: Utc::now() - Duration::days(1),
        valid_until: Utc::now() + Duration::days(1),
        is_active: true,
        usage_limit: Some(100),
        per_user_limit: None,
    })
    .await
    .expect("Error seeding coupon")
}

#[tokio::test]
async fn checkout_without_promotion() {
    let db = new_db().await;
    seed_cart(&db).await;
    let api = CheckoutApi::new(db.clone(), EventProducers::default());
    let receipt = api.checkout(checkout_request(None)).await.expect("Checkout failed");
    let order = &receipt.order;
    assert_eq!(order.subtotal, Money::from(200_000));
    assert_eq!(order.discount_amount(), Money::from(0));
    assert_eq!(order.total, Money::from(200_000));
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(order.settlement.is_none());
    assert!(receipt.discount_warning.is_none());
}

#[tokio::test]
async fn checkout_with_coupon() {
    let db = new_db().await;
    seed_cart(&db).await;
    let promo_id = seed_save10(&db).await;
    let api = CheckoutApi::new(db.clone(), EventProducers::default());
    let receipt = api.checkout(checkout_request(Some("save10"))).await.expect("Checkout failed");
    let order = &receipt.order;
    assert_eq!(order.subtotal, Money::from(200_000));
    assert_eq!(order.discount_amount(), Money::from(20_000));
    assert_eq!(order.total, Money::from(180_000));
    let applied = order.discount.expect("Discount missing from order");
    assert_eq!(applied.promotion_id, promo_id);
    assert_eq!(applied.kind, DiscountKind::Percentage);
}

#[tokio::test]
async fn rejected_promotions_do_not_block_checkout() {
    let db = new_db().await;
    seed_cart(&db).await;
    let api = CheckoutApi::new(db.clone(), EventProducers::default());
    let receipt = api.checkout(checkout_request(Some("NOSUCHCODE"))).await.expect("Checkout failed");
    assert_eq!(receipt.order.total, Money::from(200_000));
    assert_eq!(receipt.discount_warning, Some(DiscountRejection::NotFound("NOSUCHCODE".into())));
}

#[tokio::test]
async fn missing_shipping_fields_abort_checkout() {
    let db = new_db().await;
    seed_cart(&db).await;
    let api = CheckoutApi::new(db.clone(), EventProducers::default());
    let mut request = checkout_request(None);
    request.shipping.phone = "  ".into();
    let err = api.checkout(request).await.expect_err("Checkout should have failed");
    assert!(matches!(err, CheckoutError::MissingShippingField("phone")));
    // nothing was persisted, so a corrected resubmission still sees the full cart
    let receipt = api.checkout(checkout_request(None)).await.expect("Checkout failed");
    assert_eq!(receipt.order.subtotal, Money::from(200_000));
}

#[tokio::test]
async fn a_cart_can_only_be_checked_out_once() {
    let db = new_db().await;
    seed_cart(&db).await;
    let api = CheckoutApi::new(db.clone(), EventProducers::default());
    api.checkout(checkout_request(None)).await.expect("Checkout failed");
    let err = api.checkout(checkout_request(None)).await.expect_err("Second checkout should have failed");
    assert!(matches!(err, CheckoutError::EmptyCart));
}

#[tokio::test]
async fn coupon_usage_is_counted_after_checkout() {
    let db = new_db().await;
    seed_cart(&db).await;
    seed_save10(&db).await;
    let api = CheckoutApi::new(db.clone(), EventProducers::default());
    api.checkout(checkout_request(Some("SAVE10"))).await.expect("Checkout failed");
    use retail_order_engine::traits::CheckoutDatabase;
    let promo = db.fetch_promotion("SAVE10").await.expect("Lookup failed").expect("Coupon vanished");
    match promo.identity {
        retail_order_engine::db_types::PromotionIdentity::Coupon { usage_count, .. } => {
            assert_eq!(usage_count, 1)
        },
        other => panic!("Expected a coupon, got {other:?}"),
    }
}

#[tokio::test]
async fn webhook_settles_a_discounted_order() {
    let db = new_db().await;
    seed_cart(&db).await;
    seed_save10(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(Some("SAVE10"))).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    let narration = format!("thanks! {}", payment_reference(&order.order_id));
    let outcome = flow.reconcile(transfer("tx-1", 180_000, &narration)).await.expect("Reconcile failed");
    let settled = match outcome {
        ReconciliationOutcome::Settled { order } => order,
        other => panic!("Expected settlement, got {other:?}"),
    };
    assert_eq!(settled.status, OrderStatusType::Completed);
    let settlement = settled.settlement.expect("Settlement missing");
    assert_eq!(settlement.txid, "tx-1");
    assert_eq!(settlement.gateway, "acmebank");
    assert_eq!(settlement.amount, Money::from(180_000));
}

#[tokio::test]
async fn replayed_webhooks_never_settle_twice() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    let narration = payment_reference(&order.order_id);
    let event = transfer("tx-dup", 200_000, &narration);
    let first = flow.reconcile(event.clone()).await.expect("Reconcile failed");
    assert!(matches!(first, ReconciliationOutcome::Settled { .. }));

    let second = flow.reconcile(event).await.expect("Reconcile failed");
    match second {
        ReconciliationOutcome::AlreadySettled { order_id } => assert_eq!(order_id, order.order_id),
        other => panic!("Expected AlreadySettled, got {other:?}"),
    }
    // the order is byte-for-byte what the first delivery left behind
    let queries = OrderQueryApi::new(db.clone());
    let after = queries.fetch_order(&order.order_id).await.expect("Query failed").expect("Order vanished");
    assert_eq!(after.settlement.as_ref().map(|s| s.txid.as_str()), Some("tx-dup"));
    assert_eq!(after.status, OrderStatusType::Completed);
}

#[tokio::test]
async fn stripped_narration_still_settles_the_order() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    // the bank stripped every separator from the merchant-supplied reference
    let mangled: String = payment_reference(&order.order_id).chars().filter(|c| *c != '-').collect();
    let outcome = flow.reconcile(transfer("tx-stripped", 200_000, &mangled)).await.expect("Reconcile failed");
    match outcome {
        ReconciliationOutcome::Settled { order: settled } => assert_eq!(settled.order_id, order.order_id),
        other => panic!("Expected settlement, got {other:?}"),
    }
}

#[tokio::test]
async fn partial_payment_never_completes_an_order() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    let narration = payment_reference(&order.order_id);
    let outcome = flow.reconcile(transfer("tx-short", 150_000, &narration)).await.expect("Reconcile failed");
    match outcome {
        ReconciliationOutcome::InsufficientAmount { expected, received, .. } => {
            assert_eq!(expected, Money::from(200_000));
            assert_eq!(received, Money::from(150_000));
        },
        other => panic!("Expected InsufficientAmount, got {other:?}"),
    }
    let queries = OrderQueryApi::new(db.clone());
    let after = queries.fetch_order(&order.order_id).await.expect("Query failed").expect("Order vanished");
    assert_eq!(after.status, OrderStatusType::Pending);
    assert!(after.settlement.is_none());
}

#[tokio::test]
async fn unrelated_transfers_land_in_the_unattributed_bucket() {
    let db = new_db().await;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());
    let outcome = flow.reconcile(transfer("tx-noise", 42_000, "monthly rent")).await.expect("Reconcile failed");
    assert!(matches!(outcome, ReconciliationOutcome::Unattributed));

    let queries = OrderQueryApi::new(db.clone());
    let bucket = queries.unattributed_events(Pagination::default()).await.expect("Query failed");
    assert_eq!(bucket.len(), 1);
    assert_eq!(bucket[0].txid, "tx-noise");
    assert_eq!(bucket[0].outcome, "Unattributed");
}

#[tokio::test]
async fn outbound_transfers_are_ignored() {
    let db = new_db().await;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());
    let mut event = transfer("tx-out", 10_000, "refund to customer");
    event.direction = TransferDirection::Outbound;
    let outcome = flow.reconcile(event).await.expect("Reconcile failed");
    assert!(matches!(outcome, ReconciliationOutcome::Ignored { direction: TransferDirection::Outbound }));
}

#[tokio::test]
async fn payments_for_unknown_orders_are_acknowledged() {
    let db = new_db().await;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());
    let ghost = OrderId::random();
    let outcome =
        flow.reconcile(transfer("tx-ghost", 99_000, &payment_reference(&ghost))).await.expect("Reconcile failed");
    match outcome {
        ReconciliationOutcome::OrderNotFound { order_id } => assert_eq!(order_id, ghost),
        other => panic!("Expected OrderNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_orders_refuse_late_payments() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    flow.cancel_order(&order.order_id, &BuyerId::Registered(CUSTOMER.into())).await.expect("Cancel failed");
    let outcome = flow
        .reconcile(transfer("tx-late", 200_000, &payment_reference(&order.order_id)))
        .await
        .expect("Reconcile failed");
    match outcome {
        ReconciliationOutcome::OrderClosed { status, .. } => assert_eq!(status, OrderStatusType::Cancelled),
        other => panic!("Expected OrderClosed, got {other:?}"),
    }
}

#[tokio::test]
async fn settled_orders_cannot_be_cancelled() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    flow.reconcile(transfer("tx-won", 200_000, &payment_reference(&order.order_id))).await.expect("Reconcile failed");
    let err = flow
        .cancel_order(&order.order_id, &BuyerId::Registered(CUSTOMER.into()))
        .await
        .expect_err("Cancel should have failed");
    assert!(matches!(err, OrderFlowError::OrderModificationForbidden));
}

#[tokio::test]
async fn buyers_cannot_cancel_other_peoples_orders() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    let err = flow
        .cancel_order(&order.order_id, &BuyerId::Registered("someone-else".into()))
        .await
        .expect_err("Cancel should have failed");
    assert!(matches!(err, OrderFlowError::OrderModificationForbidden));
    // the admin override may, though
    flow.cancel_order(&order.order_id, &BuyerId::SystemAdminOverride).await.expect("Admin cancel failed");
}

#[tokio::test]
async fn status_overrides_respect_the_state_machine() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    let changed =
        flow.modify_status_for_order(&order.order_id, OrderStatusType::Completed).await.expect("Override failed");
    assert_eq!(changed.old_status, OrderStatusType::Pending);
    assert_eq!(changed.order.status, OrderStatusType::Completed);

    // completed orders never return to pending
    let err = flow
        .modify_status_for_order(&order.order_id, OrderStatusType::Pending)
        .await
        .expect_err("Backward transition should have failed");
    assert!(matches!(err, OrderFlowError::OrderModificationForbidden));

    let err = flow
        .modify_status_for_order(&order.order_id, OrderStatusType::Completed)
        .await
        .expect_err("Self transition should have failed");
    assert!(matches!(err, OrderFlowError::OrderModificationNoOp));

    flow.modify_status_for_order(&order.order_id, OrderStatusType::Shipped).await.expect("Override failed");
    flow.modify_status_for_order(&order.order_id, OrderStatusType::Refunded).await.expect("Override failed");
}

#[tokio::test]
async fn manual_settlement_uses_the_same_guards() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());

    let outcome = flow.mark_order_paid(&order.order_id, "paid cash on delivery").await.expect("Mark paid failed");
    let settled = match outcome {
        ReconciliationOutcome::Settled { order } => order,
        other => panic!("Expected settlement, got {other:?}"),
    };
    assert_eq!(settled.settlement.as_ref().map(|s| s.gateway.as_str()), Some("manual"));

    // a second manual settlement hits the idempotency guard like any replayed webhook
    let again = flow.mark_order_paid(&order.order_id, "paid twice?").await.expect("Mark paid failed");
    assert!(matches!(again, ReconciliationOutcome::AlreadySettled { .. }));
}

#[tokio::test]
async fn historical_prices_do_not_drift() {
    let db = new_db().await;
    let product_id = seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;

    db.update_product_price(product_id, Money::from(999_999)).await.expect("Price update failed");

    let queries = OrderQueryApi::new(db.clone());
    let details =
        queries.order_details(&order.order_id).await.expect("Query failed").expect("Order vanished");
    assert_eq!(details.order.subtotal, Money::from(200_000));
    assert_eq!(details.order.total, Money::from(200_000));
    assert_eq!(details.lines.len(), 1);
    // the frozen line price is untouched; only the display name/image reflect the live catalog
    assert_eq!(details.lines[0].line.unit_price, Money::from(100_000));
    assert_eq!(details.lines[0].product_name.as_deref(), Some("Canvas sneaker"));
    assert_eq!(details.buyer_display_name.as_deref(), Some("Alex Doe"));
}

#[tokio::test]
async fn search_and_statistics_reflect_settlements() {
    let db = new_db().await;
    seed_cart(&db).await;
    let checkout = CheckoutApi::new(db.clone(), EventProducers::default());
    let order = checkout.checkout(checkout_request(None)).await.expect("Checkout failed").order;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());
    flow.reconcile(transfer("tx-stats", 200_000, &payment_reference(&order.order_id)))
        .await
        .expect("Reconcile failed");

    let queries = OrderQueryApi::new(db.clone());
    let completed = queries
        .search_orders(
            OrderQueryFilter::default().with_status(OrderStatusType::Completed),
            Pagination::default(),
        )
        .await
        .expect("Search failed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].order_id, order.order_id);

    let stats = queries.statistics().await.expect("Stats failed");
    assert_eq!(
        stats.status_counts.iter().find(|c| c.status == OrderStatusType::Completed).map(|c| c.count),
        Some(1)
    );
    assert_eq!(stats.revenue_by_day.len(), 1);
    assert_eq!(stats.revenue_by_day[0].revenue, Money::from(200_000));
    assert_eq!(stats.revenue_by_day[0].orders, 1);
}
