use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderId, Promotion, ResolvedCartLine};

/// Storage operations the checkout flow needs.
#[allow(async_fn_in_trait)]
pub trait CheckoutDatabase: Clone {
    /// All non-tombstoned cart lines for the customer, each resolved against the live catalog.
    ///
    /// Fails with [`CheckoutError::EmptyCart`] when there are no lines, and with
    /// [`CheckoutError::ProductUnavailable`] when any referenced product no longer exists: a cart that cannot be
    /// resolved in full aborts the whole checkout, partial orders are never created.
    async fn cart_snapshot(&self, customer_id: &str) -> Result<Vec<ResolvedCartLine>, CheckoutError>;

    /// Persists the order and its lines, and tombstones exactly the given cart lines, in one transaction.
    ///
    /// The tombstone write re-checks that every line is still unconsumed inside the transaction. If another checkout
    /// got there first the transaction rolls back with [`CheckoutError::EmptyCart`], so a double-submitted request
    /// can never turn one cart into two orders.
    async fn insert_order(&self, order: NewOrder, cart_line_ids: &[i64]) -> Result<Order, CheckoutError>;

    /// Looks up a promotion for a user-entered code: first a coupon by exact code (normalized to uppercase), then a
    /// campaign by case-insensitive name. `None` if neither matches.
    async fn fetch_promotion(&self, code: &str) -> Result<Option<Promotion>, CheckoutError>;

    /// How many times this customer has redeemed the promotion.
    async fn count_redemptions(&self, promotion_id: i64, customer_id: &str) -> Result<i64, CheckoutError>;

    /// Post-persistence usage accounting: atomically increments the coupon's global usage counter (guarded against
    /// its limit in the database, not in application memory) and appends a per-(customer, coupon) ledger row.
    async fn record_redemption(
        &self,
        promotion_id: i64,
        customer_id: &str,
        order_id: &OrderId,
    ) -> Result<(), CheckoutError>;
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Product {0} is no longer available")]
    ProductUnavailable(i64),
    #[error("Shipping field '{0}' is required")]
    MissingShippingField(&'static str),
    #[error("We have an internal database error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        CheckoutError::DatabaseError(e.to_string())
    }
}
