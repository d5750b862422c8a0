//! Data types shared between the database layer and the public engine APIs.
//!
//! Everything in here is storage-format agnostic: the SQLite backend maps rows onto these types, and the APIs hand
//! them straight to callers. Monetary values are [`Money`] minor units throughout; prices captured on an order line
//! are frozen copies of the catalog price at order time and are never recomputed from the live catalog.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
#[cfg(feature = "sqlite")]
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use sqlx::Type;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use ros_common::Money;

//--------------------------------------        OrderId        -------------------------------------------------------
/// The public identifier of an order.
///
/// Order ids are hyphenated v4 UUIDs: globally unique, unguessable, and of fixed length (36 characters, 32 without
/// separators). The id is embedded verbatim in the payment narration text handed to the buyer, which is why the
/// canonical separator layout matters: banking intermediaries are known to strip the hyphens in transit, and the
/// reference extractor reconstructs them from the canonical 8-4-4-4-12 layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------        BuyerId        -------------------------------------------------------
/// The identity on whose behalf an action is performed.
///
/// Checkout always happens for a registered customer (the id is opaque to this system and comes from the external
/// auth collaborator). Administrative actions act as `SystemAdminOverride`, which is deliberately not a customer id:
/// the two cases never share a string type, so an admin override can never be mistaken for a customer record lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum BuyerId {
    Registered(String),
    SystemAdminOverride,
}

impl BuyerId {
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            BuyerId::Registered(id) => Some(id.as_str()),
            BuyerId::SystemAdminOverride => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, BuyerId::SystemAdminOverride)
    }
}

impl Display for BuyerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuyerId::Registered(id) => write!(f, "customer:{id}"),
            BuyerId::SystemAdminOverride => write!(f, "admin-override"),
        }
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// The fixed status vocabulary for orders.
///
/// `Pending` is the initial state. Payment reconciliation moves an order to `Completed`; fulfilment moves it forward
/// through `Shipped` and `Delivered`. `Cancelled` and `Refunded` are terminal for payment purposes: a settlement can
/// never be attached to an order in either state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Created at checkout; no sufficient payment has been received.
    Pending,
    /// Payment has been received in full and verified.
    Completed,
    /// Handed to the courier.
    Shipped,
    /// Confirmed received by the buyer.
    Delivered,
    /// Cancelled by the buyer or an admin before payment.
    Cancelled,
    /// Money was returned after completion. Owned by the external returns subsystem.
    Refunded,
}

impl OrderStatusType {
    /// Position in the forward fulfilment sequence. Terminal states have no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatusType::Pending => Some(0),
            OrderStatusType::Completed => Some(1),
            OrderStatusType::Shipped => Some(2),
            OrderStatusType::Delivered => Some(3),
            OrderStatusType::Cancelled | OrderStatusType::Refunded => None,
        }
    }

    /// True for states in which no payment may ever be attached.
    pub fn is_closed_for_payment(&self) -> bool {
        matches!(self, OrderStatusType::Cancelled | OrderStatusType::Refunded)
    }

    /// Whether an explicit (admin) status override from `self` to `new` is legal.
    ///
    /// Forward moves along the fulfilment sequence are allowed. `Pending` orders may be cancelled. Orders that have
    /// been completed may be refunded, but never return to `Pending`. Terminal states are immutable.
    pub fn can_transition_to(&self, new: OrderStatusType) -> bool {
        if *self == new {
            return false;
        }
        match (self.rank(), new) {
            (None, _) => false,
            (Some(0), OrderStatusType::Cancelled) => true,
            (Some(r), OrderStatusType::Refunded) => r >= 1,
            (Some(old), _) => match new.rank() {
                Some(new_rank) => new_rank > old,
                None => false,
            },
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Refunded => write!(f, "Refunded"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Settled asynchronously by the bank-transfer webhook.
    #[default]
    BankTransfer,
    /// Settled manually by an admin on delivery.
    CashOnDelivery,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::BankTransfer => write!(f, "BankTransfer"),
            PaymentMethod::CashOnDelivery => write!(f, "CashOnDelivery"),
        }
    }
}

//--------------------------------------       Product         -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub price: Money,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       CartLine        -------------------------------------------------------
/// A line in a customer's active cart. Mutable until checkout; tombstoned (`consumed_at` set), never deleted, once an
/// order has consumed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(FromRow))]
pub struct CartLine {
    pub id: i64,
    pub customer_id: String,
    pub product_id: i64,
    pub quantity: i64,
    pub chosen_size: Option<String>,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

/// A cart line resolved against the live catalog at snapshot time. The `unit_price` here is the price that gets
/// frozen onto the order line if checkout goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCartLine {
    pub cart_line_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub chosen_size: Option<String>,
    pub unit_price: Money,
}

impl ResolvedCartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------     ShippingInfo      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub recipient: String,
    pub phone: String,
    pub address: String,
}

impl ShippingInfo {
    /// The name of the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.recipient.trim().is_empty() {
            Some("recipient")
        } else if self.phone.trim().is_empty() {
            Some("phone")
        } else if self.address.trim().is_empty() {
            Some("address")
        } else {
            None
        }
    }
}

//--------------------------------------     DiscountKind      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DiscountKind {
    /// `value` is a whole percentage of the order subtotal, optionally capped.
    Percentage,
    /// `value` is an absolute amount in minor units, clamped to the subtotal.
    Fixed,
    /// Buy-one-get-one. The computation is deliberately not implemented; see the discount resolver.
    Bogo,
}

impl Display for DiscountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountKind::Percentage => write!(f, "Percentage"),
            DiscountKind::Fixed => write!(f, "Fixed"),
            DiscountKind::Bogo => write!(f, "Bogo"),
        }
    }
}

//--------------------------------------      Promotion        -------------------------------------------------------
/// How a promotion is identified, and the usage-limiting capability that only coupons carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionIdentity {
    /// An explicit alphanumeric code, normalized to uppercase, with global and per-user usage accounting.
    Coupon { code: String, usage_limit: Option<i64>, usage_count: i64, per_user_limit: Option<i64> },
    /// Matched case-insensitively by name. Campaigns have no usage counters.
    Campaign { name: String },
}

/// A discount rule. Coupons and campaigns share everything except their identification strategy and usage
/// accounting, so they are one type with a [`PromotionIdentity`] tag rather than two parallel models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    pub identity: PromotionIdentity,
    pub kind: DiscountKind,
    /// Percentage points for [`DiscountKind::Percentage`], minor units for [`DiscountKind::Fixed`].
    pub value: i64,
    pub max_discount: Option<Money>,
    pub min_order_amount: Money,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
}

#[cfg(feature = "sqlite")]
impl FromRow<'_, SqliteRow> for Promotion {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let kind_tag: String = row.try_get("kind")?;
        let identity = match kind_tag.as_str() {
            "Coupon" => PromotionIdentity::Coupon {
                code: row.try_get::<Option<String>, _>("code")?.unwrap_or_default(),
                usage_limit: row.try_get("usage_limit")?,
                usage_count: row.try_get("usage_count")?,
                per_user_limit: row.try_get("per_user_limit")?,
            },
            _ => PromotionIdentity::Campaign {
                name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
            },
        };
        Ok(Promotion {
            id: row.try_get("id")?,
            identity,
            kind: row.try_get("discount_kind")?,
            value: row.try_get("value")?,
            max_discount: row.try_get("max_discount")?,
            min_order_amount: row.try_get("min_order_amount")?,
            valid_from: row.try_get("valid_from")?,
            valid_until: row.try_get("valid_until")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

impl Promotion {
    pub fn label(&self) -> &str {
        match &self.identity {
            PromotionIdentity::Coupon { code, .. } => code.as_str(),
            PromotionIdentity::Campaign { name } => name.as_str(),
        }
    }
}

/// The discount actually granted to an order. The amount is frozen at order creation and is never recomputed, even
/// if the promotion record changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub promotion_id: i64,
    pub kind: DiscountKind,
    pub amount: Money,
}

//--------------------------------------   PaymentSettlement   -------------------------------------------------------
/// Proof that a payment event satisfied an order's total. Attached to the order at most once; its presence is the
/// authoritative "money received and verified" signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettlement {
    pub txid: String,
    pub gateway: String,
    pub narration: Option<String>,
    pub amount: Money,
    pub settled_at: DateTime<Utc>,
}

//--------------------------------------        Order          -------------------------------------------------------
/// The central aggregate. Lines, subtotal, discount and total are written once at creation; the only mutations an
/// order ever sees are status transitions and the (at most one) settlement write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub shipping: ShippingInfo,
    pub subtotal: Money,
    pub discount: Option<AppliedDiscount>,
    pub total: Money,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub settlement: Option<PaymentSettlement>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    pub fn discount_amount(&self) -> Money {
        self.discount.map(|d| d.amount).unwrap_or_default()
    }
}

#[cfg(feature = "sqlite")]
impl FromRow<'_, SqliteRow> for Order {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let discount = match row.try_get::<Option<i64>, _>("discount_promotion_id")? {
            Some(promotion_id) => Some(AppliedDiscount {
                promotion_id,
                kind: row.try_get("discount_kind")?,
                amount: row.try_get("discount_amount")?,
            }),
            None => None,
        };
        let settlement = match row.try_get::<Option<String>, _>("settled_txid")? {
            Some(txid) => Some(PaymentSettlement {
                txid,
                gateway: row.try_get("settled_gateway")?,
                narration: row.try_get("settled_narration")?,
                amount: row.try_get("settled_amount")?,
                settled_at: row.try_get("settled_at")?,
            }),
            None => None,
        };
        Ok(Order {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            customer_id: row.try_get("customer_id")?,
            shipping: ShippingInfo {
                recipient: row.try_get("shipping_recipient")?,
                phone: row.try_get("shipping_phone")?,
                address: row.try_get("shipping_address")?,
            },
            subtotal: row.try_get("subtotal")?,
            discount,
            total: row.try_get("total")?,
            status: row.try_get("status")?,
            payment_method: row.try_get("payment_method")?,
            settlement,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

//--------------------------------------      OrderLine        -------------------------------------------------------
/// One line of an order. Append-only: written at order creation and never mutated or reordered afterwards.
/// `unit_price` is the catalog price frozen at order time; later catalog changes must never alter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(FromRow))]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: i64,
    pub quantity: i64,
    pub chosen_size: Option<String>,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i64,
    pub chosen_size: Option<String>,
    pub unit_price: Money,
}

impl From<&ResolvedCartLine> for NewOrderLine {
    fn from(line: &ResolvedCartLine) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            chosen_size: line.chosen_size.clone(),
            unit_price: line.unit_price,
        }
    }
}

/// An order ready to be persisted. Constructed by the checkout API only.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: String,
    pub shipping: ShippingInfo,
    pub lines: Vec<NewOrderLine>,
    pub subtotal: Money,
    pub discount: Option<AppliedDiscount>,
    pub total: Money,
    pub payment_method: PaymentMethod,
}

impl NewOrder {
    /// Assembles a new order, deriving `total = max(0, subtotal - discount)`.
    pub fn new(
        customer_id: String,
        shipping: ShippingInfo,
        lines: Vec<NewOrderLine>,
        discount: Option<AppliedDiscount>,
        payment_method: PaymentMethod,
    ) -> Self {
        let subtotal: Money = lines.iter().map(|l| l.unit_price * l.quantity).sum();
        let discounted = subtotal - discount.map(|d| d.amount).unwrap_or_default();
        let total = if discounted.is_negative() { Money::from(0) } else { discounted };
        Self {
            order_id: OrderId::random(),
            customer_id,
            shipping,
            lines,
            subtotal,
            discount,
            total,
            payment_method,
        }
    }
}

//--------------------------------------  TransferDirection    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransferDirection {
    #[serde(rename = "in")]
    Inbound,
    #[serde(rename = "out")]
    Outbound,
}

impl Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDirection::Inbound => write!(f, "Inbound"),
            TransferDirection::Outbound => write!(f, "Outbound"),
        }
    }
}

//--------------------------------------    NewPaymentEvent    -------------------------------------------------------
/// An inbound payment notification as delivered by the gateway webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentEvent {
    /// The gateway's transaction identifier. Replays of the same transfer carry the same txid.
    pub txid: String,
    pub gateway: String,
    pub direction: TransferDirection,
    pub amount: Money,
    /// The free-text narration the payer's bank forwarded, possibly mangled in transit.
    pub narration: Option<String>,
    /// An explicit order reference, if the gateway extracted one itself. Preferred over the narration when present.
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

//--------------------------------------     PaymentEvent      -------------------------------------------------------
/// The stored record of an inbound payment event, with the outcome reconciliation assigned to it. Events that could
/// not be attributed to an order stay in this table as the manual-reconciliation bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(FromRow))]
pub struct PaymentEvent {
    pub id: i64,
    pub txid: String,
    pub gateway: String,
    pub direction: TransferDirection,
    pub amount: Money,
    pub narration: Option<String>,
    pub reference: Option<String>,
    pub matched_order_id: Option<OrderId>,
    pub outcome: String,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_overrides_follow_the_forward_rule() {
        use OrderStatusType::*;
        // forward moves
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Shipped));
        assert!(Completed.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        // payment-terminal entries
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Refunded));
        assert!(Delivered.can_transition_to(Refunded));
        // never backward out of Completed
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(Shipped));
        // terminal states are immutable
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Refunded.can_transition_to(Completed));
        // no refund before payment, no cancel after it
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Completed.can_transition_to(Cancelled));
        // self-transitions are rejected
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn totals_never_go_negative() {
        let lines = vec![NewOrderLine { product_id: 1, quantity: 1, chosen_size: None, unit_price: Money::from(500) }];
        let discount =
            AppliedDiscount { promotion_id: 9, kind: DiscountKind::Fixed, amount: Money::from(800) };
        let order = NewOrder::new(
            "cust-1".into(),
            ShippingInfo { recipient: "A".into(), phone: "1".into(), address: "B".into() },
            lines,
            Some(discount),
            PaymentMethod::BankTransfer,
        );
        assert_eq!(order.subtotal, Money::from(500));
        assert_eq!(order.total, Money::from(0));
    }

    #[test]
    fn order_ids_are_canonical_uuids() {
        let id = OrderId::random();
        assert_eq!(id.as_str().len(), 36);
        let parts: Vec<&str> = id.as_str().split('-').collect();
        let lens: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(lens, vec![8, 4, 4, 4, 12]);
    }
}
