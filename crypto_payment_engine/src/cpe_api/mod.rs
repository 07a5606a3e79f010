//! # Crypto payment engine public API
//!
//! * [`order_flow_api`] is the primary API. It creates orders, releases and expires them, and reconciles incoming
//!   transfers.
//! * [`catalog_api`] seeds and queries the catalog: products, their items, and the wallet pool.
//!
//! The other submodules hold configuration and support types.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the backend traits the API needs, plus the
//! collaborators it calls out to.
//!
//! ```rust,ignore
//! use crypto_payment_engine::{EngineConfig, FixedRateConverter, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, FixedRateConverter::new(), notifier, EngineConfig::default(), producers);
//! let order = api.create_order(&"USDT_TRC20".parse()?, product_id, chat_id, "@alice").await?;
//! ```
pub mod catalog_api;
pub mod config;
pub mod exchange_rates;
pub mod order_flow_api;
pub mod order_objects;

pub use config::{CurrencySettings, CurrencyTable, EngineConfig};
pub use order_objects::{OrderQueryFilter, ReconcileOutcome};
