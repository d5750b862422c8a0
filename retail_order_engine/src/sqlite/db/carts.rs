use log::trace;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Money, ResolvedCartLine},
    traits::CheckoutError,
};

/// One row of the cart-to-catalog join. The product columns are nullable because the join is a LEFT JOIN: a line
/// whose product has vanished from the catalog still surfaces here, and it is this module's job to notice.
#[derive(Debug, FromRow)]
struct SnapshotRow {
    cart_line_id: i64,
    product_id: i64,
    quantity: i64,
    chosen_size: Option<String>,
    product_name: Option<String>,
    unit_price: Option<Money>,
    available: Option<bool>,
}

/// All non-tombstoned cart lines for the customer, resolved against the live catalog.
///
/// Any line whose product no longer exists (or is no longer available) aborts the snapshot with
/// [`CheckoutError::ProductUnavailable`]: partial orders are never created from a cart that cannot be resolved in
/// full.
pub async fn cart_snapshot(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<ResolvedCartLine>, CheckoutError> {
    let rows: Vec<SnapshotRow> = sqlx::query_as(
        r#"
            SELECT
                c.id AS cart_line_id,
                c.product_id,
                c.quantity,
                c.chosen_size,
                p.name AS product_name,
                p.price AS unit_price,
                p.available
            FROM cart_lines c
            LEFT JOIN products p ON p.id = c.product_id
            WHERE c.customer_id = $1 AND c.consumed_at IS NULL
            ORDER BY c.id
        "#,
    )
    .bind(customer_id)
    .fetch_all(conn)
    .await?;
    if rows.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let (name, price) = match (row.product_name, row.unit_price, row.available) {
            (Some(name), Some(price), Some(true)) => (name, price),
            _ => return Err(CheckoutError::ProductUnavailable(row.product_id)),
        };
        lines.push(ResolvedCartLine {
            cart_line_id: row.cart_line_id,
            product_id: row.product_id,
            product_name: name,
            quantity: row.quantity,
            chosen_size: row.chosen_size,
            unit_price: price,
        });
    }
    trace!("🗃️ Cart snapshot for {customer_id}: {} lines", lines.len());
    Ok(lines)
}

/// Tombstones the given cart lines, returning how many were actually consumed by this call. The
/// `consumed_at IS NULL` guard means a line can only ever be consumed once, however many checkouts race over it.
pub async fn tombstone_lines(line_ids: &[i64], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if line_ids.is_empty() {
        return Ok(0);
    }
    let mut builder =
        QueryBuilder::new("UPDATE cart_lines SET consumed_at = CURRENT_TIMESTAMP WHERE consumed_at IS NULL AND id IN (");
    let mut ids = builder.separated(", ");
    for id in line_ids {
        ids.push_bind(*id);
    }
    builder.push(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Adds a line to a customer's cart.
pub async fn add_line(
    customer_id: &str,
    product_id: i64,
    quantity: i64,
    chosen_size: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO cart_lines (customer_id, product_id, quantity, chosen_size) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(customer_id)
    .bind(product_id)
    .bind(quantity)
    .bind(chosen_size)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}
