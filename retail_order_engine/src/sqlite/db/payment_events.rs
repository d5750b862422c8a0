use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPaymentEvent, OrderId, PaymentEvent},
    order_objects::Pagination,
};

/// Records an inbound payment event. Idempotent on `txid`: redeliveries of the same transfer leave the original
/// record untouched. Returns `true` if this call inserted the row.
pub async fn idempotent_insert(event: &NewPaymentEvent, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO payment_events (txid, gateway, direction, amount, narration, reference, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (txid) DO NOTHING;
        "#,
    )
    .bind(&event.txid)
    .bind(&event.gateway)
    .bind(event.direction)
    .bind(event.amount)
    .bind(event.narration.as_deref())
    .bind(event.reference.as_deref())
    .bind(event.occurred_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Stamps the stored event with the order it matched (if any) and the reconciliation outcome label.
pub async fn set_outcome(
    txid: &str,
    matched: Option<&OrderId>,
    outcome: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_events SET matched_order_id = $2, outcome = $3 WHERE txid = $1")
        .bind(txid)
        .bind(matched.map(|o| o.as_str()))
        .bind(outcome)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_event(txid: &str, conn: &mut SqliteConnection) -> Result<Option<PaymentEvent>, sqlx::Error> {
    let event =
        sqlx::query_as("SELECT * FROM payment_events WHERE txid = $1").bind(txid).fetch_optional(conn).await?;
    Ok(event)
}

/// Recorded events with no recoverable order reference, newest first. The manual-reconciliation bucket.
pub async fn fetch_unattributed(
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    let events = sqlx::query_as(
        r#"
            SELECT * FROM payment_events
            WHERE outcome = 'Unattributed'
            ORDER BY occurred_at DESC, id DESC
            LIMIT $1 OFFSET $2;
        "#,
    )
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(conn)
    .await?;
    Ok(events)
}
