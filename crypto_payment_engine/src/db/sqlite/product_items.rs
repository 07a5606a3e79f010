use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{OrderId, ProductItem};

pub async fn insert_items(
    product_id: i64,
    contents: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductItem>, sqlx::Error> {
    if contents.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO product_items (product_id, content) ");
    builder.push_values(contents, |mut row, content| {
        row.push_bind(product_id).push_bind(content.clone());
    });
    builder.push(" RETURNING *");
    builder.build_query_as::<ProductItem>().fetch_all(conn).await
}

pub async fn items_for_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Vec<ProductItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM product_items WHERE product_id = $1 ORDER BY id")
        .bind(product_id)
        .fetch_all(conn)
        .await
}

/// The oldest available item of the product. Call this only while holding the write lock, i.e. after the first write
/// of the allocation transaction, so that the item cannot be taken before [`reserve_item`] runs.
pub async fn first_available_item(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductItem>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM product_items WHERE product_id = $1 AND status = 'Available' ORDER BY id ASC LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await
}

/// Binds an available item to an order. Returns `None` if the item is no longer available.
pub async fn reserve_item(
    item_id: i64,
    order_id: &OrderId,
    lock_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductItem>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE product_items SET status = 'Reserved', order_id = $1, lock_expires_at = $2
        WHERE id = $3 AND status = 'Available'
        RETURNING *
        "#,
    )
    .bind(order_id.value())
    .bind(lock_until)
    .bind(item_id)
    .fetch_optional(conn)
    .await
}

pub async fn item_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM product_items WHERE order_id = $1").bind(order_id.value()).fetch_optional(conn).await
}

/// Unbinds every reserved item from the listed orders and makes it available again. Returns the number of items freed.
pub async fn free_items_for_orders(order_ids: &[OrderId], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(
        "UPDATE product_items SET status = 'Available', order_id = NULL, lock_expires_at = NULL WHERE status = \
         'Reserved' AND order_id IN (",
    );
    let mut ids = builder.separated(", ");
    for id in order_ids {
        ids.push_bind(id.value());
    }
    ids.push_unseparated(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
