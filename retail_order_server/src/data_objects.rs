use std::fmt::Display;

use chrono::{DateTime, Utc};
use retail_order_engine::{
    db_types::{Money, NewPaymentEvent, Order, OrderStatusType, PaymentMethod, ShippingInfo, TransferDirection},
    helpers::DiscountRejection,
    payment_objects::ReconciliationOutcome,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A checkout submission from the storefront client. The buyer identity is *not* part of the body; it arrives in
/// the `X-Buyer-Id` header, installed by the upstream auth layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSubmission {
    pub shipping: ShippingInfo,
    #[serde(default)]
    pub promotion_code: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// The total the client displayed to the buyer. Used only as a display cross-check; the server-computed total
    /// is authoritative, always.
    #[serde(default)]
    pub expected_total: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub discount_warning: Option<DiscountRejection>,
    /// True when the client-declared total disagreed with the server-computed one. The order stands either way;
    /// this flag exists so the UI can refresh what it shows the buyer.
    pub total_mismatch: bool,
}

/// The payment gateway's webhook payload for a bank-transfer notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransferNotification {
    pub transaction_id: String,
    pub gateway: String,
    pub direction: TransferDirection,
    pub transferred_amount: Money,
    /// The transfer narration as forwarded by the bank, possibly mangled in transit.
    #[serde(default)]
    pub content: Option<String>,
    /// An explicit order reference, if the gateway resolved one itself.
    #[serde(default)]
    pub reference_code: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl From<BankTransferNotification> for NewPaymentEvent {
    fn from(n: BankTransferNotification) -> Self {
        NewPaymentEvent {
            txid: n.transaction_id,
            gateway: n.gateway,
            direction: n.direction,
            amount: n.transferred_amount,
            narration: n.content,
            reference: n.reference_code,
            occurred_at: n.occurred_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Webhook acknowledgement. `success` here means "delivery processed to a terminal outcome"; it is deliberately
/// true for every outcome, including the no-ops, so the gateway stops retrying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: ReconciliationOutcome,
}

impl From<ReconciliationOutcome> for WebhookAck {
    fn from(outcome: ReconciliationOutcome) -> Self {
        Self { success: true, outcome }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPaidRequest {
    pub reason: String,
}
