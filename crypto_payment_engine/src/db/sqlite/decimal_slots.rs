use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::orders,
    helpers::{PriceSlot, PriceSlots},
    traits::OrderFlowError,
};

/// Finds the first slot among `slots` whose lock key is not held by a pending order.
///
/// The held keys are read once, under the allocation transaction's write lock, so the answer stays valid until commit.
/// The unique index on `orders.price_lock_key` backs this up: if an insert still collides, the allocator resumes the
/// search from the next slot.
pub async fn allocate_price_slot(
    address: &str,
    slots: PriceSlots,
    conn: &mut SqliteConnection,
) -> Result<PriceSlot, OrderFlowError> {
    let base_price = slots.base_price();
    let max_slots = slots.max_slots();
    let option = slots.payment_option().clone();
    let held = orders::held_lock_keys(address, &option.network, &option.currency, conn).await?;
    trace!("🧾️ {} price slots are held on {address} for {option}", held.len());
    slots
        .into_iter()
        .find(|slot| !held.contains(&slot.lock_key))
        .ok_or_else(|| OrderFlowError::PriceSlotExhausted { base_price: base_price.to_string(), slots: max_slots })
}
