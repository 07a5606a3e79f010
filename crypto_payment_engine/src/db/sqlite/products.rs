use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product},
    traits::{Page, PageRequest},
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO products (name, description, currency, price) VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(product.name)
    .bind(product.description)
    .bind(product.currency)
    .bind(product.price)
    .fetch_one(conn)
    .await
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await
}

pub async fn set_enabled(
    product_id: i64,
    enabled: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("UPDATE products SET enabled = $1 WHERE id = $2 RETURNING *")
        .bind(enabled)
        .bind(product_id)
        .fetch_optional(conn)
        .await
}

/// Recomputes the cached stock count of each listed product from its available items, in one statement.
pub async fn refresh_stock_counts(product_ids: &[i64], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"UPDATE products SET in_stock = (
            SELECT COUNT(*) FROM product_items
            WHERE product_items.product_id = products.id AND product_items.status = 'Available'
        ) WHERE id IN ("#,
    );
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Enabled products with stock, ordered by id.
pub async fn available_products(page: PageRequest, conn: &mut SqliteConnection) -> Result<Page<Product>, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE enabled = 1 AND in_stock > 0")
        .fetch_one(&mut *conn)
        .await?;
    let products = sqlx::query_as(
        "SELECT * FROM products WHERE enabled = 1 AND in_stock > 0 ORDER BY id ASC LIMIT $1 OFFSET $2",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(conn)
    .await?;
    Ok(Page::new(products, page, total))
}
