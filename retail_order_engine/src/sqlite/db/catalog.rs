use sqlx::SqliteConnection;

use crate::db_types::{Money, Product};

/// Inserts a product into the catalog, returning its id.
pub async fn insert_product(
    name: &str,
    image_url: Option<&str>,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) =
        sqlx::query_as("INSERT INTO products (name, image_url, price) VALUES ($1, $2, $3) RETURNING id")
            .bind(name)
            .bind(image_url)
            .bind(price)
            .fetch_one(conn)
            .await?;
    Ok(row.0)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

/// Updates a product's live catalog price. Historical order lines keep the price they froze at order time.
pub async fn update_product_price(
    product_id: i64,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET price = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(price)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(())
}
