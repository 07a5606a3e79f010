use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{NewWallet, Wallet};

/// Adds a wallet to the pool, or returns the existing one if the address is already registered on this network.
pub async fn insert_wallet(wallet: NewWallet, conn: &mut SqliteConnection) -> Result<Wallet, sqlx::Error> {
    let inserted: Option<Wallet> = sqlx::query_as(
        r#"
        INSERT INTO wallets (address, network) VALUES ($1, $2)
        ON CONFLICT (address, network) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&wallet.address)
    .bind(&wallet.network)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(w) => Ok(w),
        None => {
            debug!("🗃️ Wallet {} on {} is already registered", wallet.address, wallet.network);
            sqlx::query_as("SELECT * FROM wallets WHERE address = $1 AND network = $2")
                .bind(wallet.address)
                .bind(wallet.network)
                .fetch_one(conn)
                .await
        },
    }
}

pub async fn fetch_wallet(wallet_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallets WHERE id = $1").bind(wallet_id).fetch_optional(conn).await
}

pub async fn wallets_for_network(network: &str, conn: &mut SqliteConnection) -> Result<Vec<Wallet>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallets WHERE network = $1 ORDER BY id").bind(network).fetch_all(conn).await
}

/// Claims the least recently locked free wallet on `network` for exclusive use, in a single statement.
///
/// Wallets that have never been locked come first, then the one whose last lock expired earliest.
pub async fn claim_free_wallet(
    network: &str,
    lock_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE wallets SET status = 'Locked', lock_expires_at = $1
        WHERE id = (
            SELECT id FROM wallets
            WHERE status = 'Free' AND network = $2
            ORDER BY lock_expires_at ASC, id ASC
            LIMIT 1
        )
        RETURNING *
        "#,
    )
    .bind(lock_until)
    .bind(network)
    .fetch_optional(conn)
    .await
}

/// Picks the wallet on `network` with the fewest pending orders and extends its lock expiry, in a single statement.
/// Wallet status is ignored, since shared wallets are never exclusively locked.
pub async fn touch_least_loaded_wallet(
    network: &str,
    lock_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE wallets SET lock_expires_at = $1
        WHERE id = (
            SELECT w.id FROM wallets w
            WHERE w.network = $2
            ORDER BY (SELECT COUNT(*) FROM orders o WHERE o.wallet_id = w.id AND o.status = 'Pending') ASC, w.id ASC
            LIMIT 1
        )
        RETURNING *
        "#,
    )
    .bind(lock_until)
    .bind(network)
    .fetch_optional(conn)
    .await
}

/// All wallets on `network`, least loaded first.
pub async fn shared_wallet_candidates(network: &str, conn: &mut SqliteConnection) -> Result<Vec<Wallet>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT w.* FROM wallets w
        WHERE w.network = $1
        ORDER BY (SELECT COUNT(*) FROM orders o WHERE o.wallet_id = w.id AND o.status = 'Pending') ASC, w.id ASC
        "#,
    )
    .bind(network)
    .fetch_all(conn)
    .await
}

pub async fn touch_wallet(
    wallet_id: i64,
    lock_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as("UPDATE wallets SET lock_expires_at = $1 WHERE id = $2 RETURNING *")
        .bind(lock_until)
        .bind(wallet_id)
        .fetch_optional(conn)
        .await
}

/// Frees the listed wallets, but only those that are locked and no longer bound to any pending order. A wallet that
/// has already been handed to a new order is left alone. `lock_expires_at` is kept as a record of the last lock.
///
/// Returns the number of wallets freed.
pub async fn free_wallets(wallet_ids: &[i64], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if wallet_ids.is_empty() {
        return Ok(0);
    }
    let mut builder =
        QueryBuilder::<Sqlite>::new("UPDATE wallets SET status = 'Free' WHERE status = 'Locked' AND id IN (");
    let mut ids = builder.separated(", ");
    for id in wallet_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(
        ") AND NOT EXISTS (SELECT 1 FROM orders WHERE orders.wallet_id = wallets.id AND orders.status = 'Pending')",
    );
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
