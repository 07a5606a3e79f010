//! `SqliteDatabase` is the SQLite backend for the crypto payment engine.
//!
//! It implements all the traits defined in the [`crate::traits`] module by composing the low-level functions of the
//! sibling modules into transactions.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{allocation, db_url, new_pool, orders, product_items, products, reclamation, transfers, wallets};
use crate::{
    cpe_api::OrderQueryFilter,
    db_types::{
        NewProduct,
        NewTransfer,
        NewWallet,
        Order,
        OrderId,
        OrderStatusType,
        Product,
        ProductItem,
        Transfer,
        Wallet,
        WalletPolicy,
    },
    traits::{
        Allocation,
        AllocationRequest,
        CatalogManagement,
        OrderEngineDatabase,
        OrderFlowError,
        Page,
        PageRequest,
        PaidTransition,
        ReclaimedOrders,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

fn commit_failure(e: sqlx::Error) -> OrderFlowError {
    OrderFlowError::CommitFailure(e.to_string())
}

impl OrderEngineDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn allocate_order(&self, request: AllocationRequest) -> Result<Allocation, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let allocation = allocation::allocate_order(request, &mut tx).await?;
        tx.commit().await.map_err(commit_failure)?;
        Ok(allocation)
    }

    async fn release_orders(
        &self,
        order_ids: &[OrderId],
        now: DateTime<Utc>,
    ) -> Result<ReclaimedOrders, OrderFlowError> {
        if order_ids.is_empty() {
            return Ok(ReclaimedOrders::default());
        }
        let mut tx = self.pool.begin().await?;
        let released = reclamation::release_orders(order_ids, now, &mut tx).await?;
        tx.commit().await.map_err(commit_failure)?;
        Ok(ReclaimedOrders::new(released))
    }

    async fn expire_orders(&self, now: DateTime<Utc>) -> Result<ReclaimedOrders, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let expired = reclamation::expire_orders(now, &mut tx).await?;
        tx.commit().await.map_err(commit_failure)?;
        Ok(ReclaimedOrders::new(expired))
    }

    async fn pending_orders_for_customer(&self, chat_id: i64) -> Result<Vec<OrderId>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let ids = orders::pending_order_ids_for_customer(chat_id, &mut conn).await?;
        Ok(ids)
    }

    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<Transfer, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        transfers::idempotent_insert(transfer, &mut conn).await
    }

    async fn transfers_for_order(&self, order_id: &OrderId) -> Result<Vec<Transfer>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let transfers = transfers::transfers_for_order(order_id, &mut conn).await?;
        Ok(transfers)
    }

    async fn mark_order_paid(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<PaidTransition, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let transition = match orders::mark_paid(order_id, now, &mut tx).await? {
            Some(order) => {
                if order.wallet_policy == WalletPolicy::Exclusive {
                    let freed = wallets::free_wallets(&[order.wallet_id], &mut tx).await?;
                    trace!("🗃️ Freed {freed} wallet(s) for paid order {}", order.id);
                }
                PaidTransition::Transitioned(order)
            },
            None => match orders::fetch_order(order_id, &mut tx).await? {
                None => return Err(OrderFlowError::OrderNotFound(*order_id)),
                Some(order) if order.status == OrderStatusType::Paid => PaidTransition::AlreadyPaid(order),
                Some(order) => return Err(OrderFlowError::StaleOrderRace(order.id, order.status.to_string())),
            },
        };
        tx.commit().await.map_err(commit_failure)?;
        Ok(transition)
    }

    async fn set_order_message_id(&self, order_id: &OrderId, message_id: i64) -> Result<Order, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_message_id(order_id, message_id, &mut conn)
            .await?
            .ok_or(OrderFlowError::OrderNotFound(*order_id))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_item_for_order(&self, order_id: &OrderId) -> Result<Option<ProductItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let item = product_items::item_for_order(order_id, &mut conn).await?;
        Ok(item)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::insert_product(product, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn set_product_enabled(&self, product_id: i64, enabled: bool) -> Result<Product, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        products::set_enabled(product_id, enabled, &mut conn).await?.ok_or(OrderFlowError::ProductNotFound(product_id))
    }

    async fn insert_product_items(
        &self,
        product_id: i64,
        contents: &[String],
    ) -> Result<Vec<ProductItem>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let items = product_items::insert_items(product_id, contents, &mut tx).await?;
        products::refresh_stock_counts(&[product_id], &mut tx).await?;
        tx.commit().await.map_err(commit_failure)?;
        Ok(items)
    }

    async fn fetch_product_items(&self, product_id: i64) -> Result<Vec<ProductItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let items = product_items::items_for_product(product_id, &mut conn).await?;
        Ok(items)
    }

    async fn refresh_stock_counts(&self, product_ids: &[i64]) -> Result<(), OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let n = products::refresh_stock_counts(product_ids, &mut conn).await?;
        trace!("🗃️ Refreshed stock counts for {n} product(s)");
        Ok(())
    }

    async fn fetch_available_products(&self, page: PageRequest) -> Result<Page<Product>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let page = products::available_products(page, &mut conn).await?;
        Ok(page)
    }

    async fn register_wallet(&self, wallet: NewWallet) -> Result<Wallet, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::insert_wallet(wallet, &mut conn).await?;
        Ok(wallet)
    }

    async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet(wallet_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn fetch_wallets_for_network(&self, network: &str) -> Result<Vec<Wallet>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let wallets = wallets::wallets_for_network(network, &mut conn).await?;
        Ok(wallets)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `CPG_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}
