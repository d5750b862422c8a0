use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

/// Fired when checkout persists a new order in `Pending` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired exactly once per order, when a settlement is attached and the order moves to `Completed`. The settlement
/// compare-and-set guarantees the "exactly once" part even under duplicate webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub order: Order,
}

impl OrderSettledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired when an order is closed without payment (cancelled) or after refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderSettled(OrderSettledEvent),
    OrderAnnulled(OrderAnnulledEvent),
}
