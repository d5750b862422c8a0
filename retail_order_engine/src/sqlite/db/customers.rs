use sqlx::SqliteConnection;

/// Creates or updates the display name we hold for a customer. The id itself is opaque and owned by the external
/// auth collaborator.
pub async fn upsert_customer(
    customer_id: &str,
    display_name: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO customers (customer_id, display_name) VALUES ($1, $2)
            ON CONFLICT (customer_id) DO UPDATE SET display_name = excluded.display_name
        "#,
    )
    .bind(customer_id)
    .bind(display_name)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn display_name(customer_id: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT display_name FROM customers WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|r| r.0))
}
