use crate::db_types::{Order, OrderStatusType};

/// The result of the guarded settlement write.
#[derive(Debug, Clone)]
pub enum SettleAttempt {
    /// The compare-and-set succeeded; this call attached the settlement.
    Settled(Order),
    /// The guard failed: another writer settled, cancelled or otherwise closed the order first. The order as it
    /// stood after that write is returned so the caller can report what actually happened.
    Lost(Order),
}

/// An order before and after a status transition.
#[derive(Debug, Clone)]
pub struct OrderChanged {
    pub old_status: OrderStatusType,
    pub order: Order,
}
