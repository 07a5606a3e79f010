use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex},
};

use cpg_common::Amount;
use cucumber::World;
use crypto_payment_engine::{
    db_types::{Order, Product},
    events::EventProducers,
    test_utils::prepare_env::new_test_database,
    CatalogApi,
    EngineConfig,
    FixedRateConverter,
    OrderEngineDatabase,
    OrderFlowApi,
    OrderFlowError,
    SqliteDatabase,
};
use log::*;
use rust_decimal_macros::dec;

use crate::cucumber::mocks::MockNotifier;

#[derive(Default, Debug, World)]
pub struct EngineWorld {
    pub config: EngineConfig,
    pub system: Option<EngineSystem>,
    pub products: HashMap<String, Product>,
    /// The last order each customer managed to create
    pub orders: HashMap<i64, Order>,
    /// The last error each customer ran into
    pub errors: HashMap<i64, OrderFlowError>,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
}

pub struct EngineSystem {
    pub db_url: String,
    pub db: SqliteDatabase,
    pub api: OrderFlowApi<SqliteDatabase, FixedRateConverter, MockNotifier>,
    pub catalog: CatalogApi<SqliteDatabase>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl Debug for EngineSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EngineSystem ({})", self.db_url)
    }
}

impl EngineSystem {
    pub async fn new(config: EngineConfig) -> Self {
        let db = new_test_database(4).await;
        let db_url = db.url().to_string();
        debug!("🚀️ Created database: {db_url} ({config})");
        let converter = FixedRateConverter::new().with_rate("CNY", "USDT", Amount::from(dec!(0.14)));
        let sent = Arc::new(Mutex::new(Vec::<SentMessage>::new()));
        let outbox = Arc::clone(&sent);
        let mut notifier = MockNotifier::new();
        notifier.expect_send().returning(move |chat_id, text, _| {
            let mut outbox = outbox.lock().unwrap();
            outbox.push(SentMessage { chat_id, text: text.to_string() });
            Ok(outbox.len() as i64)
        });
        notifier.expect_delete().returning(|_, _| Ok(()));
        let api = OrderFlowApi::new(db.clone(), converter, notifier, config, EventProducers::default());
        let catalog = CatalogApi::new(db.clone());
        Self { db_url, db, api, catalog, sent }
    }

    /// The messages delivered to the customer so far
    pub fn sent_to(&self, chat_id: i64) -> Vec<SentMessage> {
        self.sent.lock().unwrap().iter().filter(|m| m.chat_id == chat_id).cloned().collect()
    }
}

impl EngineWorld {
    /// The engine under test. It is started on first use, so configuration steps must come first.
    pub async fn system(&mut self) -> &EngineSystem {
        if self.system.is_none() {
            self.system = Some(EngineSystem::new(self.config.clone()).await);
        }
        self.system.as_ref().expect("Engine was just started")
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("Product {name} has not been set up"))
    }

    pub fn order_for(&self, chat_id: i64) -> &Order {
        self.orders.get(&chat_id).unwrap_or_else(|| panic!("Customer {chat_id} has no order"))
    }
}
