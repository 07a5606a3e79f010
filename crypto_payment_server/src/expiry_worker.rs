use std::time::Duration;

use chrono::Utc;
use crypto_payment_engine::{db_types::Order, FixedRateConverter, OrderFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::notifier::LogNotifier;

pub type ServerApi = OrderFlowApi<SqliteDatabase, FixedRateConverter, LogNotifier>;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(api: ServerApi, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Order expiry worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running order expiry job");
            match api.expire_orders(Utc::now()).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired", expired.count());
                    debug!("🕰️ Expired orders: {}", order_list(&expired.orders));
                },
                Err(e) => {
                    error!("🕰️ Error running order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] chat_id: {} {} {}", o.id, o.customer_chat_id, o.price, o.currency))
        .collect::<Vec<String>>()
        .join(", ")
}
