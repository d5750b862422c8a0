use chrono::Utc;
use retail_order_engine::db_types::{
    Money,
    Order,
    OrderId,
    OrderStatusType,
    PaymentMethod,
    PaymentSettlement,
    ResolvedCartLine,
    ShippingInfo,
};

pub fn shipping() -> ShippingInfo {
    ShippingInfo { recipient: "Alex Doe".into(), phone: "555-0100".into(), address: "12 Main St".into() }
}

pub fn cart_line() -> ResolvedCartLine {
    ResolvedCartLine {
        cart_line_id: 1,
        product_id: 7,
        product_name: "Canvas sneaker".into(),
        quantity: 2,
        chosen_size: Some("42".into()),
        unit_price: Money::from(100_000),
    }
}

pub fn pending_order() -> Order {
    Order {
        id: 1,
        order_id: OrderId("018f6a5e-93d2-4b8a-a8e1-55c3a9d0f1b2".into()),
        customer_id: "cust-1001".into(),
        shipping: shipping(),
        subtotal: Money::from(200_000),
        discount: None,
        total: Money::from(200_000),
        status: OrderStatusType::Pending,
        payment_method: PaymentMethod::BankTransfer,
        settlement: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

pub fn settled_order(txid: &str) -> Order {
    let mut order = pending_order();
    order.status = OrderStatusType::Completed;
    order.settlement = Some(PaymentSettlement {
        txid: txid.into(),
        gateway: "acmebank".into(),
        narration: Some(format!("ORD-{}", order.order_id.as_str())),
        amount: order.total,
        settled_at: Utc::now(),
    });
    order
}
