use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProduct, NewWallet, Product, ProductItem, Wallet},
    traits::{CatalogManagement, OrderFlowError, Page, PageRequest},
};

/// Seeds and queries the catalog: products, their sellable items, and the wallet pool.
pub struct CatalogApi<B> {
    db: B,
}

impl<B> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn add_product(&self, product: NewProduct) -> Result<Product, OrderFlowError> {
        if !product.price.is_positive() {
            return Err(OrderFlowError::InvalidAmount(format!("{} costs {}", product.name, product.price)));
        }
        let product = self.db.insert_product(product).await?;
        info!("🗃️ Product {} ({}) added at {} {}", product.id, product.name, product.price, product.currency);
        Ok(product)
    }

    pub async fn product(&self, product_id: i64) -> Result<Product, OrderFlowError> {
        self.db.fetch_product(product_id).await?.ok_or(OrderFlowError::ProductNotFound(product_id))
    }

    pub async fn set_product_enabled(&self, product_id: i64, enabled: bool) -> Result<Product, OrderFlowError> {
        self.db.set_product_enabled(product_id, enabled).await
    }

    /// Adds one available item per entry in `contents`, and refreshes the product's stock count. Returns the product
    /// as it is after the update.
    pub async fn add_product_items(&self, product_id: i64, contents: &[String]) -> Result<Product, OrderFlowError> {
        let product = self.product(product_id).await?;
        let items = self.db.insert_product_items(product.id, contents).await?;
        debug!("🗃️ {} item(s) added to product {product_id}", items.len());
        self.product(product_id).await
    }

    pub async fn product_items(&self, product_id: i64) -> Result<Vec<ProductItem>, OrderFlowError> {
        self.db.fetch_product_items(product_id).await
    }

    /// Enabled products that are in stock.
    pub async fn available_products(&self, page: PageRequest) -> Result<Page<Product>, OrderFlowError> {
        self.db.fetch_available_products(page).await
    }

    pub async fn register_wallet(&self, wallet: NewWallet) -> Result<Wallet, OrderFlowError> {
        let wallet = self.db.register_wallet(wallet).await?;
        debug!("🗃️ Wallet {} registered on {}", wallet.address, wallet.network);
        Ok(wallet)
    }

    pub async fn register_wallets(&self, wallets: Vec<NewWallet>) -> Result<Vec<Wallet>, OrderFlowError> {
        let mut result = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            result.push(self.register_wallet(wallet).await?);
        }
        Ok(result)
    }

    pub async fn wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, OrderFlowError> {
        self.db.fetch_wallet(wallet_id).await
    }

    pub async fn wallets_for_network(&self, network: &str) -> Result<Vec<Wallet>, OrderFlowError> {
        self.db.fetch_wallets_for_network(network).await
    }
}
