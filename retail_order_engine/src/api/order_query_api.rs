use std::fmt::Debug;

use crate::{
    db_types::{Order, OrderId, PaymentEvent},
    order_objects::{OrderDetails, OrderQueryFilter, OrderStatistics, Pagination},
    traits::{OrderManagement, OrderQueryError},
};

/// Read-side projections over orders. Depends on, and never mutates, the order aggregate.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderQueryError> {
        self.db.fetch_order_by_order_id(order_id).await
    }

    pub async fn order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderQueryError> {
        self.db.fetch_order_details(order_id).await
    }

    pub async fn search_orders(
        &self,
        query: OrderQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<Order>, OrderQueryError> {
        self.db.search_orders(query, pagination).await
    }

    pub async fn statistics(&self) -> Result<OrderStatistics, OrderQueryError> {
        self.db.order_statistics().await
    }

    pub async fn unattributed_events(&self, pagination: Pagination) -> Result<Vec<PaymentEvent>, OrderQueryError> {
        self.db.fetch_unattributed_events(pagination).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
