use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    cpe_api::OrderQueryFilter,
    db_types::{NewTransfer, Order, OrderId, ProductItem, Transfer},
    traits::{
        data_objects::{Allocation, AllocationRequest, PaidTransition, ReclaimedOrders},
        CatalogManagement,
        PriceConversionError,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the crypto payment engine.
///
/// This behaviour includes:
/// * Allocating new orders: reserving a product item, a wallet and an exact price in one atomic step
/// * Closing pending orders, either by release or by expiry, and reclaiming their wallets and items
/// * Recording confirmed transfers and moving orders to paid
///
/// Every method that touches more than one row must do so in a single transaction. Implementations must acquire the
/// rows they intend to change before reading anything that influences the change, so that two concurrent callers can
/// never both act on the same free wallet, product item, or price slot.
#[allow(async_fn_in_trait)]
pub trait OrderEngineDatabase: Clone + CatalogManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Allocates a new pending order for the request, in a single atomic transaction:
    /// * Releases any order the customer still has pending, and reclaims its wallet and item.
    /// * Acquires a wallet and final price under `request.policy`.
    /// * Reserves one available product item.
    /// * Inserts the order, binds the item to it and records the wallet's lock expiry.
    ///
    /// A customer never ends up with more than one pending order, even when allocations for the same customer run
    /// concurrently. Nothing is written if any step fails, so a failed reorder leaves the earlier order pending.
    /// The product's cached stock count is NOT refreshed here; call [`CatalogManagement::refresh_stock_counts`] after
    /// this returns.
    async fn allocate_order(&self, request: AllocationRequest) -> Result<Allocation, OrderFlowError>;

    /// Marks every order in `order_ids` that is still pending as `Released`, and reclaims its wallet and product item.
    /// Orders that have already left the pending state are skipped, so calling this twice is harmless.
    async fn release_orders(&self, order_ids: &[OrderId], now: DateTime<Utc>)
        -> Result<ReclaimedOrders, OrderFlowError>;

    /// Marks every pending order whose expiry time is at or before `now` as `Expired`, and reclaims its wallet and
    /// product item, in one transaction.
    async fn expire_orders(&self, now: DateTime<Utc>) -> Result<ReclaimedOrders, OrderFlowError>;

    /// The ids of all pending orders for the given customer.
    async fn pending_orders_for_customer(&self, chat_id: i64) -> Result<Vec<OrderId>, OrderFlowError>;

    /// Stores a confirmed transfer. Transfers are idempotent on their transaction id; a repeat insert fails with
    /// [`OrderFlowError::TransferAlreadyExists`].
    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<Transfer, OrderFlowError>;

    async fn transfers_for_order(&self, order_id: &OrderId) -> Result<Vec<Transfer>, OrderFlowError>;

    /// Moves the order from pending to paid. The exclusive wallet bound to the order is freed in the same
    /// transaction. The product item stays reserved, since it has been sold.
    ///
    /// If the order is already paid, this is a no-op that returns [`PaidTransition::AlreadyPaid`]. If it expired or
    /// was released in the meantime, it returns [`OrderFlowError::StaleOrderRace`].
    async fn mark_order_paid(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<PaidTransition, OrderFlowError>;

    /// Records the id of the payment-request message that was sent for this order.
    async fn set_order_message_id(&self, order_id: &OrderId, message_id: i64) -> Result<Order, OrderFlowError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// The product item bound to the order, if any.
    async fn fetch_item_for_order(&self, order_id: &OrderId) -> Result<Option<ProductItem>, OrderFlowError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Could not convert the price. {0}")]
    RateUnavailable(#[from] PriceConversionError),
    #[error("There is no free wallet for the {0} network")]
    NoFreeWallet(String),
    #[error("All {slots} price slots starting at {base_price} are taken")]
    PriceSlotExhausted { base_price: String, slots: u32 },
    #[error("Product {0} is out of stock")]
    OutOfStock(i64),
    #[error("Order {0} has already left the pending state ({1})")]
    StaleOrderRace(OrderId, String),
    #[error("The transaction could not be committed. {0}")]
    CommitFailure(String),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested product {0} is not for sale")]
    ProductUnavailable(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The payment option {0} is not enabled")]
    PaymentOptionDisabled(String),
    #[error("Cannot insert transfer, since it already exists with txid {0}")]
    TransferAlreadyExists(String),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("{0} is not supported")]
    UnsupportedCurrency(String),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
