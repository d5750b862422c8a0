use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, PaymentEvent},
    order_objects::{OrderDetails, OrderQueryFilter, OrderStatistics, Pagination},
};

/// Read-side storage operations. Nothing here mutates anything.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// The order with the given public id, among non-tombstoned orders.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderQueryError>;

    /// The order with its lines, enriched with current product names/images and the buyer's display name. The
    /// enrichment is a join-on-read: the frozen line prices are returned as stored, never overwritten with live
    /// catalog prices.
    async fn fetch_order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderQueryError>;

    /// Orders matching the filter, newest first, paginated.
    async fn search_orders(
        &self,
        query: OrderQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<Order>, OrderQueryError>;

    /// Aggregate statistics: order counts per status and revenue per day over settled orders.
    async fn order_statistics(&self) -> Result<OrderStatistics, OrderQueryError>;

    /// Recorded payment events that could not be attributed to any order, newest first. This is the
    /// manual-reconciliation bucket.
    async fn fetch_unattributed_events(&self, pagination: Pagination) -> Result<Vec<PaymentEvent>, OrderQueryError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderQueryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for OrderQueryError {
    fn from(e: sqlx::Error) -> Self {
        OrderQueryError::DatabaseError(e.to_string())
    }
}
