#![allow(dead_code)]

mod mocks;

use cpg_common::Amount;
use crypto_payment_engine::{
    db_types::{NewProduct, NewWallet, PaymentOption, Product, ProductItemStatus, Wallet, WalletPolicy},
    events::EventProducers,
    test_utils::prepare_env::{drop_test_database, new_test_database},
    CatalogApi,
    CatalogManagement,
    EngineConfig,
    FixedRateConverter,
    OrderFlowApi,
    SqliteDatabase,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub use self::mocks::{quiet_notifier, silent_notifier, MockNotifier, MockPriceConverter};

pub type TestApi = OrderFlowApi<SqliteDatabase, FixedRateConverter, MockNotifier>;

pub struct TestSystem {
    pub db: SqliteDatabase,
    pub api: TestApi,
    pub catalog: CatalogApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new(config: EngineConfig) -> Self {
        Self::with_notifier(config, quiet_notifier()).await
    }

    /// Unmet notifier expectations fail the test when the system is torn down.
    pub async fn with_notifier(config: EngineConfig, notifier: MockNotifier) -> Self {
        let db = new_test_database(8).await;
        let api = OrderFlowApi::new(db.clone(), converter(), notifier, config, EventProducers::default());
        let catalog = CatalogApi::new(db.clone());
        Self { db, api, catalog }
    }

    pub async fn exclusive() -> Self {
        Self::new(EngineConfig::new(WalletPolicy::Exclusive)).await
    }

    pub async fn shared() -> Self {
        Self::new(EngineConfig::new(WalletPolicy::SharedPriceSlot)).await
    }

    /// A product priced in USDT, with `items` items in stock.
    pub async fn product(&self, price: Decimal, items: usize) -> Product {
        let product = self
            .catalog
            .add_product(NewProduct::new("Gift card", "USDT", Amount::from(price)))
            .await
            .expect("Error adding product");
        self.stock(product.id, items).await
    }

    pub async fn stock(&self, product_id: i64, items: usize) -> Product {
        let contents = (0..items).map(|i| format!("CODE-{product_id}-{i}")).collect::<Vec<_>>();
        self.catalog.add_product_items(product_id, &contents).await.expect("Error adding items")
    }

    pub async fn wallets(&self, network: &str, count: usize) -> Vec<Wallet> {
        let wallets = (0..count).map(|i| NewWallet::new(format!("T{network}Wallet{i}"), network.to_string())).collect();
        self.catalog.register_wallets(wallets).await.expect("Error registering wallets")
    }

    /// Checks that the cached stock count matches the number of available items.
    pub async fn assert_stock_is_consistent(&self, product_id: i64) {
        let product = self.catalog.product(product_id).await.expect("Error fetching product");
        let available = self
            .db
            .fetch_product_items(product_id)
            .await
            .expect("Error fetching items")
            .into_iter()
            .filter(|i| i.status == ProductItemStatus::Available)
            .count();
        assert_eq!(product.in_stock, available as i64, "Cached stock count is out of date");
    }

    pub async fn teardown(self) {
        drop_test_database(self.db).await;
    }
}

pub fn converter() -> FixedRateConverter {
    FixedRateConverter::new()
        .with_rate("CNY", "USDT", Amount::from(dec!(0.14)))
        .with_rate("CNY", "TRX", Amount::from(dec!(0.5)))
}

pub fn usdt() -> PaymentOption {
    PaymentOption::new("USDT", "TRC20")
}
