use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{AppliedDiscount, Money, NewOrder, NewOrderLine, Order, PaymentMethod, PromotionIdentity, ShippingInfo},
    events::{EventProducers, OrderCreatedEvent},
    helpers::{resolve_discount, DiscountRejection},
    order_objects::CheckoutReceipt,
    traits::{CheckoutDatabase, CheckoutError},
};

/// A validated checkout submission. The customer id comes from the external auth collaborator and is opaque here;
/// the shipping fields have already passed (or will fail) presence validation; the promotion code is whatever the
/// buyer typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub shipping: ShippingInfo,
    #[serde(default)]
    pub promotion_code: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// `CheckoutApi` turns a customer's cart into a persisted `Pending` order.
///
/// The flow is deliberately two-phase: the order and the cart-line tombstones are one atomic transaction (so a
/// double-submitted checkout can never mint two orders from one cart), while promotion usage accounting runs after
/// the commit as a best-effort side effect that never unwinds the order.
pub struct CheckoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> CheckoutApi<B>
where B: CheckoutDatabase
{
    /// Creates an order from the customer's current cart.
    ///
    /// Validation failures (missing shipping fields, empty cart, vanished product) abort the checkout with no
    /// persisted state. A promotion that fails to resolve does *not* abort: the order proceeds with zero discount
    /// and the rejection is returned in the receipt so the caller can tell the buyer what happened.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, CheckoutError> {
        if let Some(field) = request.shipping.missing_field() {
            return Err(CheckoutError::MissingShippingField(field));
        }
        let snapshot = self.db.cart_snapshot(&request.customer_id).await?;
        let subtotal: Money = snapshot.iter().map(|l| l.line_total()).sum();
        let (discount, warning) = match request.promotion_code.as_deref().map(str::trim) {
            None | Some("") => (None, None),
            Some(code) => match self.resolve_promotion(code, subtotal, &request.customer_id).await? {
                Ok(applied) => (Some(applied), None),
                Err(rejection) => {
                    info!("🛒️ Promotion '{code}' not applied to checkout: {rejection}");
                    (None, Some(rejection))
                },
            },
        };
        let lines: Vec<NewOrderLine> = snapshot.iter().map(NewOrderLine::from).collect();
        let cart_line_ids: Vec<i64> = snapshot.iter().map(|l| l.cart_line_id).collect();
        let new_order = NewOrder::new(
            request.customer_id,
            request.shipping,
            lines,
            discount,
            request.payment_method,
        );
        let order = self.db.insert_order(new_order, &cart_line_ids).await?;
        debug!("🛒️ Order [{}] created for {} at {}", order.order_id, order.customer_id, order.total);
        if let Some(applied) = &order.discount {
            // Usage accounting only after the order is durably persisted. A failure here must not unwind the order;
            // the redemption is lost from the counters, not from the books.
            if let Err(e) =
                self.db.record_redemption(applied.promotion_id, &order.customer_id, &order.order_id).await
            {
                warn!(
                    "🛒️ Could not record redemption of promotion {} for order [{}]: {e}",
                    applied.promotion_id, order.order_id
                );
            }
        }
        self.call_order_created_hook(&order).await;
        Ok(CheckoutReceipt { order, discount_warning: warning })
    }

    /// Resolves a user-entered promotion code against the promotion records. The outer `Result` is infrastructure
    /// failure; the inner one is the business decision.
    async fn resolve_promotion(
        &self,
        code: &str,
        subtotal: Money,
        customer_id: &str,
    ) -> Result<Result<AppliedDiscount, DiscountRejection>, CheckoutError> {
        let promotion = match self.db.fetch_promotion(code).await? {
            Some(p) => p,
            None => return Ok(Err(DiscountRejection::NotFound(code.to_string()))),
        };
        let user_redemptions = match &promotion.identity {
            PromotionIdentity::Coupon { per_user_limit: Some(_), .. } => {
                self.db.count_redemptions(promotion.id, customer_id).await?
            },
            _ => 0,
        };
        Ok(resolve_discount(&promotion, subtotal, user_redemptions, Utc::now()))
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            trace!("🛒️ Notifying order created hook subscribers");
            let event = OrderCreatedEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
