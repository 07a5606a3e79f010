use crate::{
    db_types::{NewProduct, NewWallet, Product, ProductItem, Wallet},
    traits::{
        data_objects::{Page, PageRequest},
        OrderFlowError,
    },
};

/// The catalog side of the store: products, their sellable items, and the pool of receiving wallets.
///
/// The engine only reads the catalog, apart from reserving and freeing items and wallets, which happens inside
/// [`crate::traits::OrderEngineDatabase`] transactions.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, OrderFlowError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderFlowError>;

    /// Enables or disables a product for sale. Disabled products cannot be ordered.
    async fn set_product_enabled(&self, product_id: i64, enabled: bool) -> Result<Product, OrderFlowError>;

    /// Adds sellable items to a product. Each entry of `contents` becomes one available item.
    async fn insert_product_items(&self, product_id: i64, contents: &[String])
        -> Result<Vec<ProductItem>, OrderFlowError>;

    async fn fetch_product_items(&self, product_id: i64) -> Result<Vec<ProductItem>, OrderFlowError>;

    /// Recomputes the cached `in_stock` count of each product from its available items.
    async fn refresh_stock_counts(&self, product_ids: &[i64]) -> Result<(), OrderFlowError>;

    /// Enabled products that have at least one item in stock, ordered by id.
    async fn fetch_available_products(&self, page: PageRequest) -> Result<Page<Product>, OrderFlowError>;

    /// Adds a receiving address to the pool. Registering the same address and network twice returns the existing
    /// wallet.
    async fn register_wallet(&self, wallet: NewWallet) -> Result<Wallet, OrderFlowError>;

    async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, OrderFlowError>;

    async fn fetch_wallets_for_network(&self, network: &str) -> Result<Vec<Wallet>, OrderFlowError>;
}
