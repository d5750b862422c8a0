//! `SqliteDatabase` is the concrete storage backend for the retail order engine.
//!
//! It implements all the traits defined in the [`crate::traits`] module over a SQLite connection pool. Transaction
//! boundaries live here: the low-level functions in [`super::db`] take plain connections and are composed into
//! atomic units by these methods.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{carts, catalog, customers, db_url, new_pool, orders, payment_events, promotions, run_migrations};
use crate::{
    db_types::{
        Money,
        NewOrder,
        NewPaymentEvent,
        Order,
        OrderId,
        OrderStatusType,
        PaymentEvent,
        PaymentSettlement,
        Product,
        Promotion,
        ResolvedCartLine,
    },
    order_objects::{OrderDetails, OrderQueryFilter, OrderStatistics, Pagination},
    sqlite::db::promotions::NewPromotion,
    traits::{
        CheckoutDatabase,
        CheckoutError,
        OrderChanged,
        OrderFlowDatabase,
        OrderFlowError,
        OrderManagement,
        OrderQueryError,
        SettleAttempt,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database at `ROS_DATABASE_URL` (or the default path) and applies pending migrations.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        run_migrations(&pool).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) {
        self.pool.close().await;
    }

    // ------------------------------------ seeding / operator helpers ------------------------------------------
    // The surrounding catalog and customer CRUD is out of the engine's scope; these minimal write paths exist so
    // that deployments, fixtures and tests can populate the tables the engine reads.

    pub async fn insert_product(
        &self,
        name: &str,
        image_url: Option<&str>,
        price: Money,
    ) -> Result<i64, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_product(name, image_url, price, &mut conn).await
    }

    pub async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_product(product_id, &mut conn).await
    }

    pub async fn update_product_price(&self, product_id: i64, price: Money) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        catalog::update_product_price(product_id, price, &mut conn).await
    }

    pub async fn upsert_customer(&self, customer_id: &str, display_name: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        customers::upsert_customer(customer_id, display_name, &mut conn).await
    }

    pub async fn add_cart_line(
        &self,
        customer_id: &str,
        product_id: i64,
        quantity: i64,
        chosen_size: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        carts::add_line(customer_id, product_id, quantity, chosen_size, &mut conn).await
    }

    pub async fn insert_promotion(&self, promotion: &NewPromotion<'_>) -> Result<i64, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        promotions::insert_promotion(promotion, &mut conn).await
    }

    pub async fn fetch_payment_event(&self, txid: &str) -> Result<Option<PaymentEvent>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        payment_events::fetch_event(txid, &mut conn).await
    }
}

impl CheckoutDatabase for SqliteDatabase {
    async fn cart_snapshot(&self, customer_id: &str) -> Result<Vec<ResolvedCartLine>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        carts::cart_snapshot(customer_id, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder, cart_line_ids: &[i64]) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let persisted = orders::insert_order(order, &mut tx).await?;
        let consumed = carts::tombstone_lines(cart_line_ids, &mut tx).await?;
        if consumed != cart_line_ids.len() as u64 {
            // Another checkout consumed (some of) these lines between our snapshot and this transaction. Roll the
            // whole order back: the losing submission observes an empty cart, never a duplicate order.
            tx.rollback().await?;
            debug!(
                "🗃️ Checkout raced: only {consumed} of {} cart lines were still unconsumed. Order rolled back.",
                cart_line_ids.len()
            );
            return Err(CheckoutError::EmptyCart);
        }
        tx.commit().await?;
        debug!("🗃️ Order [{}] saved with id {}", persisted.order_id, persisted.id);
        Ok(persisted)
    }

    async fn fetch_promotion(&self, code: &str) -> Result<Option<Promotion>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let promotion = promotions::fetch_promotion_by_code_or_name(code, &mut conn).await?;
        Ok(promotion)
    }

    async fn count_redemptions(&self, promotion_id: i64, customer_id: &str) -> Result<i64, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let count = promotions::count_redemptions(promotion_id, customer_id, &mut conn).await?;
        Ok(count)
    }

    async fn record_redemption(
        &self,
        promotion_id: i64,
        customer_id: &str,
        order_id: &OrderId,
    ) -> Result<(), CheckoutError> {
        let mut tx = self.pool.begin().await?;
        promotions::record_redemption(promotion_id, customer_id, order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl OrderFlowDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn record_payment_event(&self, event: &NewPaymentEvent) -> Result<bool, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let inserted = payment_events::idempotent_insert(event, &mut conn).await?;
        if inserted {
            debug!("🗃️ Payment event [{}] recorded ({} via {})", event.txid, event.amount, event.gateway);
        }
        Ok(inserted)
    }

    async fn finalize_payment_event(
        &self,
        txid: &str,
        matched: Option<OrderId>,
        outcome: &str,
    ) -> Result<(), OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        payment_events::set_outcome(txid, matched.as_ref(), outcome, &mut conn).await?;
        Ok(())
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn try_settle_order(
        &self,
        order_id: &OrderId,
        settlement: PaymentSettlement,
    ) -> Result<SettleAttempt, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        match orders::try_settle(order_id, settlement, &mut conn).await? {
            Some(order) => Ok(SettleAttempt::Settled(order)),
            None => {
                // The guard failed. Re-read so the caller can see who won.
                let order = orders::fetch_order_by_order_id(order_id, &mut conn)
                    .await?
                    .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
                Ok(SettleAttempt::Lost(order))
            },
        }
    }

    async fn try_cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::try_cancel(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<OrderChanged, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let old = orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let order = orders::update_status(order_id, status, &mut conn)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        Ok(OrderChanged { old_status: old.status, order })
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let details = orders::order_details(order_id, &mut conn).await?;
        Ok(details)
    }

    async fn search_orders(
        &self,
        query: OrderQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<Order>, OrderQueryError> {
        if pagination.limit <= 0 || pagination.offset < 0 {
            return Err(OrderQueryError::QueryError("Pagination values must be positive".to_string()));
        }
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, pagination, &mut conn).await?;
        Ok(orders)
    }

    async fn order_statistics(&self) -> Result<OrderStatistics, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let stats = orders::statistics(&mut conn).await?;
        Ok(stats)
    }

    async fn fetch_unattributed_events(&self, pagination: Pagination) -> Result<Vec<PaymentEvent>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let events = payment_events::fetch_unattributed(pagination, &mut conn).await?;
        Ok(events)
    }
}
