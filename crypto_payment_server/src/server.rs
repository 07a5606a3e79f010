use crypto_payment_engine::{
    events::{EventHandlers, EventHooks},
    OrderEngineDatabase,
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;

use crate::{config::ServerConfig, errors::ServerError, expiry_worker::start_expiry_worker, notifier::LogNotifier};

const EVENT_BUFFER_SIZE: usize = 25;

/// Opens the database, starts the expiry sweeper and runs until the process receives Ctrl-C.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let mut db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializationError(e.to_string()))?;
    if config.auto_migrate {
        db.run_migrations().await.map_err(|e| ServerError::DatabaseError(e.to_string()))?;
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, event_log_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = OrderFlowApi::new(db.clone(), config.exchange_rates, LogNotifier::new(), config.engine, producers);
    let worker = start_expiry_worker(api, config.sweep_interval);

    tokio::signal::ctrl_c().await.map_err(|e| ServerError::InitializationError(e.to_string()))?;
    info!("🚀️ Shutting down");
    worker.abort();
    db.close().await?;
    Ok(())
}

fn event_log_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| {
            Box::pin(async move {
                let o = ev.order;
                info!("📬️ Order {} created: {} {} to {} on {}", o.id, o.price, o.currency, o.wallet_address, o.network);
            })
        })
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} paid by chat {}", ev.order.id, ev.order.customer_chat_id);
            })
        })
        .on_order_annulled(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} annulled ({})", ev.order.id, ev.status);
            })
        });
    hooks
}
