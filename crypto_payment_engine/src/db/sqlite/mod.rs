//! # SQLite backend
//!
//! The "low-level" SQLite interactions live in plain functions that accept a `&mut SqliteConnection`. Callers obtain
//! a connection from the pool, or open a transaction and pass `&mut *tx`, without any other changes.
//!
//! SQLite has no row locks. Every mutating transaction therefore starts with a write (an `UPDATE ... RETURNING`
//! that claims the row it needs), which takes the database write lock. Concurrent writers wait in the busy handler
//! until the holder commits or rolls back, so any rows read after the first statement cannot change underneath us.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

mod allocation;
mod decimal_slots;
mod reclamation;
mod sqlite_impl;
mod wallet_locks;

pub mod orders;
pub mod product_items;
pub mod products;
pub mod transfers;
pub mod wallets;

pub use sqlite_impl::SqliteDatabase;
pub use wallet_locks::WalletLease;

const SQLITE_DB_URL: &str = "sqlite://data/crypto_payments.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(15);

pub fn db_url() -> String {
    let result = env::var("CPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ CPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(err) if err.is_unique_violation())
}
