use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        BuyerId,
        NewPaymentEvent,
        Order,
        OrderId,
        OrderStatusType,
        PaymentSettlement,
        TransferDirection,
    },
    events::{EventProducers, OrderAnnulledEvent, OrderSettledEvent},
    helpers::{extract_order_id, DEFAULT_MIN_REFERENCE_RUN},
    payment_objects::ReconciliationOutcome,
    traits::{OrderChanged, OrderFlowDatabase, OrderFlowError, SettleAttempt},
};

/// `OrderFlowApi` is the primary API for payment reconciliation and explicit order lifecycle transitions.
///
/// Reconciliation is idempotent and commutative under retry: replaying a payment event any number of times after
/// the first successful settlement always yields [`ReconciliationOutcome::AlreadySettled`], never a second
/// settlement, and never a second round of downstream effects. The guarantee rests on two things: the settlement is
/// embedded in the order row, and the write is a compare-and-set that only fires while the order is still `Pending`
/// and unsettled.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    min_reference_run: usize,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, min_reference_run: DEFAULT_MIN_REFERENCE_RUN }
    }

    /// Overrides the minimum alphanumeric run length the reference extractor will consider a stripped order id.
    pub fn with_min_reference_run(mut self, min_run: usize) -> Self {
        self.min_reference_run = min_run;
        self
    }
}

impl<B> OrderFlowApi<B>
where B: OrderFlowDatabase
{
    /// Reconciles one inbound payment event against the order book.
    ///
    /// Every event is recorded (idempotently by txid) before any matching happens, so unattributed funds are never
    /// lost; the resolved outcome is stamped onto the record afterwards. Only a successful settlement mutates an
    /// order. All other outcomes are acknowledged no-ops and must be reported to the gateway as success, since
    /// redelivery cannot make them resolvable.
    pub async fn reconcile(&self, event: NewPaymentEvent) -> Result<ReconciliationOutcome, OrderFlowError> {
        let txid = event.txid.clone();
        let inserted = self.db.record_payment_event(&event).await?;
        if !inserted {
            debug!("💰️ Payment event [{txid}] has been delivered before. Replaying it is harmless.");
        }
        let outcome = self.resolve_outcome(&event).await?;
        self.db.finalize_payment_event(&txid, outcome.order_id().cloned(), outcome.label()).await?;
        if let ReconciliationOutcome::Settled { order } = &outcome {
            info!("💰️ Order [{}] settled in full by payment [{txid}]", order.order_id);
            self.call_order_settled_hook(order).await;
        } else {
            debug!("💰️ Payment [{txid}] reconciled with outcome {}", outcome.label());
        }
        Ok(outcome)
    }

    async fn resolve_outcome(&self, event: &NewPaymentEvent) -> Result<ReconciliationOutcome, OrderFlowError> {
        if event.direction != TransferDirection::Inbound {
            return Ok(ReconciliationOutcome::Ignored { direction: event.direction });
        }
        // An explicit reference from the gateway wins; otherwise fall back to mining the narration text.
        let resolved = event
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| OrderId(s.to_string()))
            .or_else(|| event.narration.as_deref().and_then(|m| extract_order_id(m, self.min_reference_run)));
        let order_id = match resolved {
            Some(id) => id,
            None => {
                trace!("💰️ No order reference in payment [{}]. Routed to the unattributed bucket.", event.txid);
                return Ok(ReconciliationOutcome::Unattributed);
            },
        };
        let order = match self.db.fetch_order_by_order_id(&order_id).await? {
            Some(order) => order,
            None => return Ok(ReconciliationOutcome::OrderNotFound { order_id }),
        };
        if order.is_settled() {
            return Ok(ReconciliationOutcome::AlreadySettled { order_id: order.order_id });
        }
        if order.status != OrderStatusType::Pending {
            return Ok(ReconciliationOutcome::OrderClosed { order_id: order.order_id, status: order.status });
        }
        if event.amount < order.total {
            debug!(
                "💰️ Payment [{}] covers {} of the {} owed on order [{}]. The order stays pending.",
                event.txid, event.amount, order.total, order.order_id
            );
            return Ok(ReconciliationOutcome::InsufficientAmount {
                order_id: order.order_id,
                expected: order.total,
                received: event.amount,
            });
        }
        let settlement = PaymentSettlement {
            txid: event.txid.clone(),
            gateway: event.gateway.clone(),
            narration: event.narration.clone(),
            amount: event.amount,
            settled_at: Utc::now(),
        };
        match self.db.try_settle_order(&order.order_id, settlement).await? {
            SettleAttempt::Settled(order) => Ok(ReconciliationOutcome::Settled { order }),
            // Another delivery (or an admin) won the race between our read and the guarded write.
            SettleAttempt::Lost(order) => {
                if order.is_settled() {
                    Ok(ReconciliationOutcome::AlreadySettled { order_id: order.order_id })
                } else {
                    Ok(ReconciliationOutcome::OrderClosed { order_id: order.order_id.clone(), status: order.status })
                }
            },
        }
    }

    /// Cancels an order on behalf of `actor`.
    ///
    /// Buyers may only cancel their own orders; the admin override may cancel any. The write is guarded the same
    /// way as settlement (still `Pending`, still unsettled), so a cancellation racing a webhook settlement has
    /// exactly one winner and the loser is told the modification is no longer possible.
    pub async fn cancel_order(&self, order_id: &OrderId, actor: &BuyerId) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if let BuyerId::Registered(customer_id) = actor {
            if customer_id != &order.customer_id {
                debug!("📦️ {actor} may not cancel order [{order_id}] belonging to {}", order.customer_id);
                return Err(OrderFlowError::OrderModificationForbidden);
            }
        }
        match self.db.try_cancel_order(order_id).await? {
            Some(order) => {
                info!("📦️ Order [{order_id}] cancelled by {actor}");
                self.call_order_annulled_hook(&order).await;
                Ok(order)
            },
            None => {
                debug!("📦️ Order [{order_id}] could not be cancelled; it was settled or closed concurrently.");
                Err(OrderFlowError::OrderModificationForbidden)
            },
        }
    }

    /// Explicit (admin) status override. Bypasses reconciliation, but not the transition rules.
    ///
    /// | From \ To | Pending | Completed | Shipped | Delivered | Cancelled | Refunded |
    /// |-----------|---------|-----------|---------|-----------|-----------|----------|
    /// | Pending   | Err     | ✓         | ✓       | ✓         | ✓         | Err      |
    /// | Completed | Err     | Err       | ✓       | ✓         | Err       | ✓        |
    /// | Shipped   | Err     | Err       | Err     | ✓         | Err       | ✓        |
    /// | Delivered | Err     | Err       | Err     | Err       | Err       | ✓        |
    /// | Cancelled | Err     | Err       | Err     | Err       | Err       | Err      |
    /// | Refunded  | Err     | Err       | Err     | Err       | Err       | Err      |
    ///
    /// Cancellation goes through the same guarded write as [`Self::cancel_order`], so even an admin cannot cancel
    /// an order out from under a concurrent settlement.
    pub async fn modify_status_for_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<OrderChanged, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let old_status = order.status;
        if old_status == new_status {
            return Err(OrderFlowError::OrderModificationNoOp);
        }
        if !old_status.can_transition_to(new_status) {
            debug!("📦️ Status override {old_status} -> {new_status} for order [{order_id}] is forbidden");
            return Err(OrderFlowError::OrderModificationForbidden);
        }
        let changed = match new_status {
            OrderStatusType::Cancelled => {
                let order = self
                    .db
                    .try_cancel_order(order_id)
                    .await?
                    .ok_or(OrderFlowError::OrderModificationForbidden)?;
                OrderChanged { old_status, order }
            },
            _ => self.db.update_order_status(order_id, new_status).await?,
        };
        info!("📦️ Order [{order_id}] status changed from {old_status} to {new_status}");
        if new_status.is_closed_for_payment() {
            self.call_order_annulled_hook(&changed.order).await;
        }
        Ok(changed)
    }

    /// Marks an order as paid by hand, e.g. for cash-on-delivery or a transfer the gateway never reported.
    ///
    /// This is not a separate code path: a synthetic `manual` payment event for the order total is pushed through
    /// [`Self::reconcile`], so the settlement guards (idempotency, closed orders) apply to admins exactly as they
    /// do to the gateway.
    pub async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<ReconciliationOutcome, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let now = Utc::now();
        let event = NewPaymentEvent {
            txid: format!("manual_{}:{}", order.order_id.as_str(), now.timestamp()),
            gateway: "manual".to_string(),
            direction: TransferDirection::Inbound,
            amount: order.total,
            narration: Some(reason.to_string()),
            reference: Some(order.order_id.as_str().to_string()),
            occurred_at: now,
        };
        self.reconcile(event).await
    }

    async fn call_order_settled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_settled_producer {
            trace!("💰️ Notifying order settled hook subscribers");
            let event = OrderSettledEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            trace!("📦️ Notifying order annulled hook subscribers");
            let event = OrderAnnulledEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
