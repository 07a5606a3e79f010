//! Crypto Payment Engine
//!
//! The engine binds a customer's purchase intent to exactly one receiving address and one exact expected amount, holds
//! that binding until the payment arrives or the order expires, and returns the address and the product item to the
//! pool when the order closes.
//!
//! Receiving addresses are handed out under one of two policies (see [`db_types::WalletPolicy`]):
//! 1. **Exclusive**: each pending order holds its own wallet.
//! 2. **Shared price slot**: many pending orders share a wallet, and each is told to pay a slightly different amount.
//!    The lowest decimal places of the price identify the order.
//!
//! The library is divided into:
//! 1. Storage ([`mod@db`]). SQLite is the supported backend. Backends implement the traits in [`traits`]. The data
//!    types used in the database are defined in [`db_types`] and are public.
//! 2. The public API ([`OrderFlowApi`], [`CatalogApi`]). Collaborators the engine calls out to (exchange rates and
//!    customer messaging) are injected through the [`PriceConverter`] and [`Notifier`] traits.
//!
//! The engine also publishes [`events`] when orders are created, paid or annulled.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

mod cpe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, WalletLease};
pub use cpe_api::{
    catalog_api::CatalogApi,
    config,
    config::{ConfigError, CurrencySettings, CurrencyTable, EngineConfig},
    exchange_rates::FixedRateConverter,
    order_flow_api::{OrderFlowApi, PAID_ORDER_HISTORY},
    order_objects,
    order_objects::{OrderQueryFilter, ReconcileOutcome},
};
pub use traits::{
    Attachment,
    CatalogManagement,
    Notifier,
    NotifierError,
    OrderEngineDatabase,
    OrderFlowError,
    Page,
    PageRequest,
    PriceConversionError,
    PriceConverter,
};
