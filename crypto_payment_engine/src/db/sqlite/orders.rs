use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    cpe_api::OrderQueryFilter,
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
};

/// Inserts a new pending order. This is not atomic on its own; run it inside the allocation transaction.
///
/// Fails with a unique-constraint violation if the order's price lock key is already held by another pending order.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                currency,
                network,
                price,
                price_lock_key,
                base_currency,
                base_price,
                wallet_id,
                wallet_address,
                wallet_policy,
                product_id,
                customer_chat_id,
                customer_handle,
                created_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *;
        "#,
    )
    .bind(order.currency)
    .bind(order.network)
    .bind(order.price)
    .bind(order.price_lock_key)
    .bind(order.base_currency)
    .bind(order.base_price)
    .bind(order.wallet_id)
    .bind(order.wallet_address)
    .bind(order.wallet_policy)
    .bind(order.product_id)
    .bind(order.customer_chat_id)
    .bind(order.customer_handle)
    .bind(order.created_at)
    .bind(order.expires_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id.value()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn pending_order_ids_for_customer(
    chat_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderId>, sqlx::Error> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM orders WHERE customer_chat_id = $1 AND status = 'Pending' ORDER BY id")
            .bind(chat_id)
            .fetch_all(conn)
            .await?;
    Ok(ids.into_iter().map(OrderId::from).collect())
}

/// The lock keys currently held by pending orders paying `currency` on `network` into `address`.
pub async fn held_lock_keys(
    address: &str,
    network: &str,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<HashSet<String>, sqlx::Error> {
    let keys: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT price_lock_key FROM orders
        WHERE status = 'Pending'
          AND price_lock_key IS NOT NULL
          AND wallet_address = $1
          AND network = $2
          AND currency = $3
        "#,
    )
    .bind(address)
    .bind(network)
    .bind(currency)
    .fetch_all(conn)
    .await?;
    Ok(keys.into_iter().collect())
}

/// Moves the listed orders that are still pending to `status` (released or expired), clearing their lock keys.
/// Orders in any other state are left alone. Returns the orders that changed.
pub async fn close_pending_orders(
    order_ids: &[OrderId],
    status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(status);
    builder.push(", closed_at = ");
    builder.push_bind(now);
    builder.push(", price_lock_key = NULL WHERE status = 'Pending' AND id IN (");
    let mut ids = builder.separated(", ");
    for id in order_ids {
        ids.push_bind(id.value());
    }
    ids.push_unseparated(") RETURNING *");
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ {} of {} orders moved to {status}", orders.len(), order_ids.len());
    Ok(orders)
}

/// Moves every pending order of the customer to `status`, clearing their lock keys. Returns the orders that changed.
pub async fn close_customer_orders(
    chat_id: i64,
    status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        UPDATE orders SET status = $1, closed_at = $2, price_lock_key = NULL
        WHERE status = 'Pending' AND customer_chat_id = $3
        RETURNING *
        "#,
    )
    .bind(status)
    .bind(now)
    .bind(chat_id)
    .fetch_all(conn)
    .await?;
    trace!("🗃️ {} pending order(s) of customer {chat_id} moved to {status}", orders.len());
    Ok(orders)
}

/// Expires every pending order whose expiry time is at or before `now`.
pub async fn expire_pending_orders(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'Expired', closed_at = $1, price_lock_key = NULL
        WHERE status = 'Pending' AND expires_at <= $2
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Moves a pending order to paid. Returns `None` if the order does not exist or is not pending.
pub async fn mark_paid(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'Paid', closed_at = $1, price_lock_key = NULL
        WHERE id = $2 AND status = 'Pending'
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(order_id.value())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn set_message_id(
    order_id: &OrderId,
    message_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("UPDATE orders SET message_id = $1 WHERE id = $2 RETURNING *")
        .bind(message_id)
        .bind(order_id.value())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Returns all orders matching the filter. Orders are sorted by id, oldest first unless `newest_first` is set.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("id = ");
        where_clause.push_bind_unseparated(order_id.value());
    }
    if let Some(chat_id) = query.customer_chat_id {
        where_clause.push("customer_chat_id = ");
        where_clause.push_bind_unseparated(chat_id);
    }
    if let Some(product_id) = query.product_id {
        where_clause.push("product_id = ");
        where_clause.push_bind_unseparated(product_id);
    }
    if let Some(currency) = query.currency {
        where_clause.push("currency = ");
        where_clause.push_bind_unseparated(currency);
    }
    if let Some(since) = query.closed_since {
        where_clause.push("closed_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.closed_until {
        where_clause.push("closed_at < ");
        where_clause.push_bind_unseparated(until);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        let mut first = true;
        for status in statuses {
            if !first {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
            first = false;
        }
        where_clause.push_unseparated(")");
    }
    if query.newest_first {
        builder.push(" ORDER BY id DESC");
    } else {
        builder.push(" ORDER BY id ASC");
    }
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}
