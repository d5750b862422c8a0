use serde::{Deserialize, Serialize};

use crate::db_types::{Money, Order, OrderId, OrderStatusType, TransferDirection};

/// The terminal result of reconciling one inbound payment event.
///
/// Only [`ReconciliationOutcome::Settled`] mutates anything. Every other outcome is an acknowledged no-op: the
/// webhook caller gets a success-shaped answer so the gateway stops redelivering, and the event record keeps the
/// outcome label for later inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// This event paid for the order; the settlement was attached and the order is now `Completed`.
    Settled { order: Order },
    /// The order already has a settlement. Expected under duplicate webhook delivery.
    AlreadySettled { order_id: OrderId },
    /// The order was cancelled, refunded, or otherwise no longer open for payment.
    OrderClosed { order_id: OrderId, status: OrderStatusType },
    /// The transferred amount does not cover the order total. The order stays `Pending`; no state was changed.
    InsufficientAmount { order_id: OrderId, expected: Money, received: Money },
    /// A reference was recovered but no live order carries that id.
    OrderNotFound { order_id: OrderId },
    /// No order reference could be recovered from the event. Frequent and unremarkable: most inbound transfers have
    /// nothing to do with orders. The event stays recorded for manual reconciliation.
    Unattributed,
    /// The event is not an inbound transfer and is not actionable.
    Ignored { direction: TransferDirection },
}

impl ReconciliationOutcome {
    /// Short label stored on the payment event record.
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Settled { .. } => "Settled",
            ReconciliationOutcome::AlreadySettled { .. } => "AlreadySettled",
            ReconciliationOutcome::OrderClosed { .. } => "OrderClosed",
            ReconciliationOutcome::InsufficientAmount { .. } => "InsufficientAmount",
            ReconciliationOutcome::OrderNotFound { .. } => "OrderNotFound",
            ReconciliationOutcome::Unattributed => "Unattributed",
            ReconciliationOutcome::Ignored { .. } => "Ignored",
        }
    }

    /// The order id this outcome refers to, when one was resolved.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            ReconciliationOutcome::Settled { order } => Some(&order.order_id),
            ReconciliationOutcome::AlreadySettled { order_id } |
            ReconciliationOutcome::OrderClosed { order_id, .. } |
            ReconciliationOutcome::InsufficientAmount { order_id, .. } |
            ReconciliationOutcome::OrderNotFound { order_id } => Some(order_id),
            ReconciliationOutcome::Unattributed | ReconciliationOutcome::Ignored { .. } => None,
        }
    }
}
