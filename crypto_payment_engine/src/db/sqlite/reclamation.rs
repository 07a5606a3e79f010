use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{orders, product_items, wallets},
    db_types::{Order, OrderId, OrderStatusType},
};

/// Releases the listed orders that are still pending, and reclaims their wallets and items. Must run inside a
/// transaction. The first statement is the order update, which takes the write lock.
pub async fn release_orders(
    order_ids: &[OrderId],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let released = orders::close_pending_orders(order_ids, OrderStatusType::Released, now, conn).await?;
    reclaim(&released, conn).await?;
    Ok(released)
}

/// Releases every pending order of the customer, and reclaims its wallet and item. Must run inside a transaction.
/// The UPDATE takes the write lock even if the customer has nothing pending.
pub async fn release_customer_orders(
    chat_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let released = orders::close_customer_orders(chat_id, OrderStatusType::Released, now, conn).await?;
    reclaim(&released, conn).await?;
    Ok(released)
}

/// Expires every overdue pending order, and reclaims its wallet and item. Must run inside a transaction.
pub async fn expire_orders(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let expired = orders::expire_pending_orders(now, conn).await?;
    reclaim(&expired, conn).await?;
    Ok(expired)
}

/// Returns the items and wallets of closed orders to the pool. The orders must already have left the pending state,
/// otherwise their wallets would still count as in use.
async fn reclaim(closed: &[Order], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    if closed.is_empty() {
        return Ok(());
    }
    let order_ids = closed.iter().map(|o| o.id).collect::<Vec<_>>();
    let mut wallet_ids = closed.iter().map(|o| o.wallet_id).collect::<Vec<_>>();
    wallet_ids.sort_unstable();
    wallet_ids.dedup();
    let items = product_items::free_items_for_orders(&order_ids, conn).await?;
    let wallets = wallets::free_wallets(&wallet_ids, conn).await?;
    debug!("♻️ Reclaimed {items} item(s) and {wallets} wallet(s) from {} closed order(s)", closed.len());
    Ok(())
}
