//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite database interactions.
//!
//! All of these interactions are maintained as simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction
//! as the need arises and call through to the functions without any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod carts;
pub mod catalog;
pub mod customers;
pub mod orders;
pub mod payment_events;
pub mod promotions;

const SQLITE_DB_URL: &str = "sqlite://data/retail_store.db";

pub fn db_url() -> String {
    let result = env::var("ROS_DATABASE_URL").unwrap_or_else(|_| {
        info!("ROS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Applies the embedded schema migrations. Safe to call on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqlxError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
