use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{
        is_unique_violation,
        orders,
        product_items,
        reclamation,
        wallet_locks::{acquire_wallet, lease_slot, WalletLease},
    },
    db_types::NewOrder,
    traits::{Allocation, AllocationRequest, OrderFlowError, ReclaimedOrders},
};

/// The body of the allocation transaction. `conn` must be a transaction; it is rolled back by the caller (or on drop)
/// if this returns an error.
///
/// The order of the steps matters. Releasing the customer's pending orders is the first write, so it takes the database
/// write lock before anything is read, and two allocations for the same customer run one after the other. The released
/// wallets and items are back in the pool before the wallet claim, so a reorder can reuse them.
pub async fn allocate_order(
    request: AllocationRequest,
    conn: &mut SqliteConnection,
) -> Result<Allocation, OrderFlowError> {
    let product_id = request.product.id;
    let released = reclamation::release_customer_orders(request.customer_chat_id, request.created_at, conn).await?;
    if !released.is_empty() {
        debug!("🧾️ Released {} pending order(s) of customer {}", released.len(), request.customer_chat_id);
    }
    let mut lease = acquire_wallet(&request, conn).await?;
    let item = product_items::first_available_item(product_id, conn)
        .await?
        .ok_or(OrderFlowError::OutOfStock(product_id))?;
    let order = loop {
        match orders::insert_order(new_order(&request, &lease), conn).await {
            Ok(order) => break order,
            Err(e) if is_unique_violation(&e) => {
                let Some(slot) = lease.slot.as_ref() else {
                    return Err(e.into());
                };
                warn!("🧾️ Price slot {} was taken concurrently. Trying the next one", slot.lock_key);
                let next = slot.index + 1;
                lease = lease_slot(lease.wallet, &request, next, conn).await?;
            },
            Err(e) => return Err(e.into()),
        }
    };
    product_items::reserve_item(item.id, &order.id, request.expires_at, conn)
        .await?
        .ok_or(OrderFlowError::OutOfStock(product_id))?;
    debug!("🧾️ Item {} of product {product_id} reserved for order {}", item.id, order.id);
    Ok(Allocation { order, released: ReclaimedOrders::new(released) })
}

fn new_order(request: &AllocationRequest, lease: &WalletLease) -> NewOrder {
    NewOrder {
        currency: request.payment_option.currency.clone(),
        network: request.payment_option.network.clone(),
        price: lease.price,
        price_lock_key: lease.lock_key(),
        base_currency: request.product.currency.clone(),
        base_price: request.product.price,
        wallet_id: lease.wallet.id,
        wallet_address: lease.wallet.address.clone(),
        wallet_policy: request.policy,
        product_id: request.product.id,
        customer_chat_id: request.customer_chat_id,
        customer_handle: request.customer_handle.clone(),
        created_at: request.created_at,
        expires_at: request.expires_at,
    }
}
