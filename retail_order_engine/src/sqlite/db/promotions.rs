use log::warn;
use sqlx::SqliteConnection;

use crate::db_types::{OrderId, Promotion};

/// Looks up a promotion for a user-entered code.
///
/// Coupons are identified by exact code, normalized to uppercase; if no coupon matches, campaigns are tried by
/// case-insensitive exact name. At most one of the two lookups can succeed.
pub async fn fetch_promotion_by_code_or_name(
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Promotion>, sqlx::Error> {
    let coupon: Option<Promotion> = sqlx::query_as("SELECT * FROM promotions WHERE kind = 'Coupon' AND code = $1")
        .bind(code.trim().to_uppercase())
        .fetch_optional(&mut *conn)
        .await?;
    if coupon.is_some() {
        return Ok(coupon);
    }
    let campaign: Option<Promotion> =
        sqlx::query_as("SELECT * FROM promotions WHERE kind = 'Campaign' AND LOWER(name) = LOWER($1)")
            .bind(code.trim())
            .fetch_optional(conn)
            .await?;
    Ok(campaign)
}

/// How many times this customer has redeemed the promotion.
pub async fn count_redemptions(
    promotion_id: i64,
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM promotion_redemptions WHERE promotion_id = $1 AND customer_id = $2")
            .bind(promotion_id)
            .bind(customer_id)
            .fetch_one(conn)
            .await?;
    Ok(row.0)
}

/// Records a redemption after the order has been durably persisted.
///
/// The usage counter is incremented atomically in the database, guarded against the coupon's limit; it is never a
/// read-modify-write from application memory. Campaigns carry no counter, so the increment simply matches no row
/// for them, while the ledger entry is written for both kinds.
pub async fn record_redemption(
    promotion_id: i64,
    customer_id: &str,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE promotions SET usage_count = usage_count + 1
            WHERE id = $1
              AND kind = 'Coupon'
              AND (usage_limit IS NULL OR usage_count < usage_limit)
        "#,
    )
    .bind(promotion_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        // Either a campaign (no counter) or a coupon that raced to its limit. The order stands either way, but the
        // coupon case is worth a note in the log.
        let kind: Option<(String,)> = sqlx::query_as("SELECT kind FROM promotions WHERE id = $1")
            .bind(promotion_id)
            .fetch_optional(&mut *conn)
            .await?;
        if matches!(kind.as_ref().map(|k| k.0.as_str()), Some("Coupon")) {
            warn!("🎟️ Usage counter for coupon {promotion_id} hit its limit concurrently (order [{order_id}]).");
        }
    }
    sqlx::query("INSERT INTO promotion_redemptions (promotion_id, customer_id, order_id) VALUES ($1, $2, $3)")
        .bind(promotion_id)
        .bind(customer_id)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Inserts a promotion record, returning its id. `code` and `name` discriminate the kind: coupons carry a code,
/// campaigns a name.
pub async fn insert_promotion(
    promotion: &NewPromotion<'_>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
            INSERT INTO promotions (
                kind, code, name, discount_kind, value, max_discount, min_order_amount,
                valid_from, valid_until, is_active, usage_limit, per_user_limit
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id;
        "#,
    )
    .bind(if promotion.code.is_some() { "Coupon" } else { "Campaign" })
    .bind(promotion.code.map(|c| c.trim().to_uppercase()))
    .bind(promotion.name)
    .bind(promotion.discount_kind)
    .bind(promotion.value)
    .bind(promotion.max_discount)
    .bind(promotion.min_order_amount)
    .bind(promotion.valid_from)
    .bind(promotion.valid_until)
    .bind(promotion.is_active)
    .bind(promotion.usage_limit)
    .bind(promotion.per_user_limit)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}

/// The writable fields of a promotion record.
#[derive(Debug, Clone)]
pub struct NewPromotion<'a> {
    pub code: Option<&'a str>,
    pub name: Option<&'a str>,
    pub discount_kind: crate::db_types::DiscountKind,
    pub value: i64,
    pub max_discount: Option<crate::db_types::Money>,
    pub min_order_amount: crate::db_types::Money,
    pub valid_from: chrono::DateTime<chrono::Utc>,
    pub valid_until: chrono::DateTime<chrono::Utc>,
    pub is_active: bool,
    pub usage_limit: Option<i64>,
    pub per_user_limit: Option<i64>,
}
