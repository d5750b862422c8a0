use thiserror::Error;

use crate::{
    db_types::{NewPaymentEvent, Order, OrderId, OrderStatusType, PaymentSettlement},
    traits::{data_objects::OrderChanged, SettleAttempt},
};

/// Storage operations for payment reconciliation and explicit order lifecycle transitions.
///
/// The settlement write is the heart of the engine: the backend must implement it as a single guarded update
/// (settlement absent AND status still `Pending`) so that two concurrent webhook deliveries, or a webhook racing an
/// admin cancellation, resolve to exactly one winner.
#[allow(async_fn_in_trait)]
pub trait OrderFlowDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Records an inbound payment event. Idempotent on `txid`: returns `true` if this call inserted the record,
    /// `false` if the event was already known (a gateway redelivery).
    async fn record_payment_event(&self, event: &NewPaymentEvent) -> Result<bool, OrderFlowError>;

    /// Stamps the stored payment event with the order it matched (if any) and the reconciliation outcome label.
    async fn finalize_payment_event(
        &self,
        txid: &str,
        matched: Option<OrderId>,
        outcome: &str,
    ) -> Result<(), OrderFlowError>;

    /// The order with the given public id, among non-tombstoned orders. Matching is case-insensitive since
    /// reconstructed payment references may not preserve case.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// The guarded settlement write. Attaches `settlement` and moves the order to `Completed` if and only if the
    /// order is still `Pending` with no settlement at write time.
    async fn try_settle_order(
        &self,
        order_id: &OrderId,
        settlement: PaymentSettlement,
    ) -> Result<SettleAttempt, OrderFlowError>;

    /// Cancels the order if it is still `Pending` and unsettled. Returns `None` when the guard fails (the order was
    /// settled or closed concurrently); the caller decides how to report that.
    async fn try_cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// Writes a new status for the order. The caller is responsible for having validated the transition; this is
    /// plumbing, not policy.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<OrderChanged, OrderFlowError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("We have an internal database error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested order change would result in a no-op.")]
    OrderModificationNoOp,
    #[error("The requested order change is forbidden.")]
    OrderModificationForbidden,
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
