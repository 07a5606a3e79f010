use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::is_unique_violation,
    db_types::{NewTransfer, OrderId, Transfer},
    traits::OrderFlowError,
};

/// Stores a transfer. Transfers are unique on their transaction id, so a replayed transfer fails with
/// [`OrderFlowError::TransferAlreadyExists`] and nothing is written.
pub async fn idempotent_insert(transfer: NewTransfer, conn: &mut SqliteConnection) -> Result<Transfer, OrderFlowError> {
    let txid = transfer.txid.clone();
    let result = sqlx::query_as(
        r#"
        INSERT INTO transfers (txid, order_id, price, currency) VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(transfer.txid)
    .bind(transfer.order_id.value())
    .bind(transfer.price)
    .bind(transfer.currency)
    .fetch_one(conn)
    .await;
    match result {
        Ok(transfer) => Ok(transfer),
        Err(e) if is_unique_violation(&e) => {
            debug!("🗃️ Transfer {txid} has already been recorded");
            Err(OrderFlowError::TransferAlreadyExists(txid))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn transfers_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transfer>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transfers WHERE order_id = $1 ORDER BY id")
        .bind(order_id.value())
        .fetch_all(conn)
        .await
}
