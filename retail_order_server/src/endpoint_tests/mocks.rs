use mockall::mock;
use retail_order_engine::{
    db_types::{
        NewOrder,
        NewPaymentEvent,
        Order,
        OrderId,
        OrderStatusType,
        PaymentEvent,
        PaymentSettlement,
        Promotion,
        ResolvedCartLine,
    },
    order_objects::{OrderDetails, OrderQueryFilter, OrderStatistics, Pagination},
    traits::{
        CheckoutDatabase,
        CheckoutError,
        OrderChanged,
        OrderFlowDatabase,
        OrderFlowError,
        OrderManagement,
        OrderQueryError,
        SettleAttempt,
    },
};

mock! {
    pub CheckoutDb {}
    impl Clone for CheckoutDb {
        fn clone(&self) -> Self;
    }
    impl CheckoutDatabase for CheckoutDb {
        async fn cart_snapshot(&self, customer_id: &str) -> Result<Vec<ResolvedCartLine>, CheckoutError>;
        async fn insert_order(&self, order: NewOrder, cart_line_ids: &[i64]) -> Result<Order, CheckoutError>;
        async fn fetch_promotion(&self, code: &str) -> Result<Option<Promotion>, CheckoutError>;
        async fn count_redemptions(&self, promotion_id: i64, customer_id: &str) -> Result<i64, CheckoutError>;
        async fn record_redemption(&self, promotion_id: i64, customer_id: &str, order_id: &OrderId) -> Result<(), CheckoutError>;
    }
}

mock! {
    pub FlowDb {}
    impl Clone for FlowDb {
        fn clone(&self) -> Self;
    }
    impl OrderFlowDatabase for FlowDb {
        fn url(&self) -> &str;
        async fn record_payment_event(&self, event: &NewPaymentEvent) -> Result<bool, OrderFlowError>;
        async fn finalize_payment_event(&self, txid: &str, matched: Option<OrderId>, outcome: &str) -> Result<(), OrderFlowError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;
        async fn try_settle_order(&self, order_id: &OrderId, settlement: PaymentSettlement) -> Result<SettleAttempt, OrderFlowError>;
        async fn try_cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;
        async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<OrderChanged, OrderFlowError>;
    }
}

mock! {
    pub QueryDb {}
    impl Clone for QueryDb {
        fn clone(&self) -> Self;
    }
    impl OrderManagement for QueryDb {
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderQueryError>;
        async fn fetch_order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderQueryError>;
        async fn search_orders(&self, query: OrderQueryFilter, pagination: Pagination) -> Result<Vec<Order>, OrderQueryError>;
        async fn order_statistics(&self) -> Result<OrderStatistics, OrderQueryError>;
        async fn fetch_unattributed_events(&self, pagination: Pagination) -> Result<Vec<PaymentEvent>, OrderQueryError>;
    }
}
