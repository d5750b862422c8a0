use log::trace;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Money, NewOrder, Order, OrderId, OrderLine, OrderStatusType, PaymentSettlement},
    order_objects::{
        DailyRevenue,
        EnrichedOrderLine,
        OrderDetails,
        OrderQueryFilter,
        OrderStatistics,
        Pagination,
        StatusCount,
    },
    sqlite::db::customers,
};

/// Inserts a new order and its lines using the given connection. This is not atomic on its own; embed the call in a
/// transaction and pass `&mut *tx` as the connection argument, as the checkout flow does.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let persisted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                shipping_recipient,
                shipping_phone,
                shipping_address,
                subtotal,
                discount_promotion_id,
                discount_kind,
                discount_amount,
                total,
                payment_method
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.customer_id)
    .bind(&order.shipping.recipient)
    .bind(&order.shipping.phone)
    .bind(&order.shipping.address)
    .bind(order.subtotal)
    .bind(order.discount.map(|d| d.promotion_id))
    .bind(order.discount.map(|d| d.kind))
    .bind(order.discount.map(|d| d.amount).unwrap_or_default())
    .bind(order.total)
    .bind(order.payment_method)
    .fetch_one(&mut *conn)
    .await?;
    for line in &order.lines {
        sqlx::query(
            r#"
                INSERT INTO order_lines (order_id, product_id, quantity, chosen_size, unit_price)
                VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(persisted.order_id.as_str())
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.chosen_size.as_deref())
        .bind(line.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(persisted)
}

/// Returns the non-tombstoned order with the given public id. Matching is case-insensitive: reconstructed payment
/// references do not always preserve the case the id was issued in.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE LOWER(order_id) = LOWER($1) AND deleted_at IS NULL")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// The settlement compare-and-set.
///
/// The `WHERE` clause *is* the idempotency and cancellation guard: the write only happens if the order is still
/// `Pending`, unsettled and live at write time. Exactly one of any number of concurrent callers gets a row back;
/// the rest get `None` and must re-read the order to see what beat them.
pub async fn try_settle(
    order_id: &OrderId,
    settlement: PaymentSettlement,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'Completed',
                settled_txid = $2,
                settled_gateway = $3,
                settled_narration = $4,
                settled_amount = $5,
                settled_at = $6,
                updated_at = CURRENT_TIMESTAMP
            WHERE LOWER(order_id) = LOWER($1)
              AND settled_txid IS NULL
              AND status = 'Pending'
              AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(&settlement.txid)
    .bind(&settlement.gateway)
    .bind(settlement.narration.as_deref())
    .bind(settlement.amount)
    .bind(settlement.settled_at)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Cancels the order under the same guard as settlement, so cancellation and settlement can race and exactly one
/// will win.
pub async fn try_cancel(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Cancelled', updated_at = CURRENT_TIMESTAMP
            WHERE LOWER(order_id) = LOWER($1)
              AND settled_txid IS NULL
              AND status = 'Pending'
              AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Unguarded status write. Transition policy lives in the API layer; this only refuses to touch tombstoned orders.
pub async fn update_status(
    order_id: &OrderId,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE LOWER(order_id) = LOWER($1) AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(status)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_lines(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderLine>, sqlx::Error> {
    let lines = sqlx::query_as("SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

#[derive(Debug, FromRow)]
struct EnrichedLineRow {
    id: i64,
    order_id: OrderId,
    product_id: i64,
    quantity: i64,
    chosen_size: Option<String>,
    unit_price: Money,
    product_name: Option<String>,
    product_image: Option<String>,
}

/// The order with its lines, enriched with *current* product names and images and the buyer's display name.
/// Join-on-read only: the frozen `unit_price` on each line is returned as stored.
pub async fn order_details(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderDetails>, sqlx::Error> {
    let order = match fetch_order_by_order_id(order_id, &mut *conn).await? {
        Some(order) => order,
        None => return Ok(None),
    };
    let rows: Vec<EnrichedLineRow> = sqlx::query_as(
        r#"
            SELECT
                l.id,
                l.order_id,
                l.product_id,
                l.quantity,
                l.chosen_size,
                l.unit_price,
                p.name AS product_name,
                p.image_url AS product_image
            FROM order_lines l
            LEFT JOIN products p ON p.id = l.product_id
            WHERE l.order_id = $1
            ORDER BY l.id
        "#,
    )
    .bind(order.order_id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    let lines = rows
        .into_iter()
        .map(|row| EnrichedOrderLine {
            line: OrderLine {
                id: row.id,
                order_id: row.order_id,
                product_id: row.product_id,
                quantity: row.quantity,
                chosen_size: row.chosen_size,
                unit_price: row.unit_price,
            },
            product_name: row.product_name,
            product_image: row.product_image,
        })
        .collect();
    let buyer_display_name = customers::display_name(&order.customer_id, conn).await?;
    Ok(Some(OrderDetails { order, lines, buyer_display_name }))
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`, newest first.
pub async fn search_orders(
    query: OrderQueryFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE deleted_at IS NULL");
    if let Some(customer_id) = query.customer_id {
        builder.push(" AND customer_id = ");
        builder.push_bind(customer_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        let status_clause = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        builder.push(format!(" AND status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        builder.push(" AND created_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = query.until {
        builder.push(" AND created_at <= ");
        builder.push_bind(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(pagination.limit);
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset);
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {} rows", orders.len());
    Ok(orders)
}

#[derive(Debug, FromRow)]
struct StatusCountRow {
    status: OrderStatusType,
    count: i64,
}

#[derive(Debug, FromRow)]
struct RevenueRow {
    day: String,
    orders: i64,
    revenue: Money,
}

pub async fn statistics(conn: &mut SqliteConnection) -> Result<OrderStatistics, sqlx::Error> {
    let counts: Vec<StatusCountRow> = sqlx::query_as(
        "SELECT status, COUNT(*) AS count FROM orders WHERE deleted_at IS NULL GROUP BY status ORDER BY status",
    )
    .fetch_all(&mut *conn)
    .await?;
    let revenue: Vec<RevenueRow> = sqlx::query_as(
        r#"
            SELECT date(settled_at) AS day, COUNT(*) AS orders, SUM(total) AS revenue
            FROM orders
            WHERE settled_at IS NOT NULL AND deleted_at IS NULL
            GROUP BY date(settled_at)
            ORDER BY day DESC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(OrderStatistics {
        status_counts: counts.into_iter().map(|r| StatusCount { status: r.status, count: r.count }).collect(),
        revenue_by_day: revenue
            .into_iter()
            .map(|r| DailyRevenue { day: r.day, orders: r.orders, revenue: r.revenue })
            .collect(),
    })
}
