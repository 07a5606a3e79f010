//! #  Backend and collaborator contracts.
//!
//! This module defines the interfaces that the order engine depends on.
//!
//! * [`OrderEngineDatabase`] defines the transactional behaviour a storage backend must provide: allocating orders,
//!   releasing and expiring them, and moving them to paid. Every method that changes more than one row does so
//!   atomically.
//! * [`CatalogManagement`] provides the catalog side of the store: products, product items and the wallet pool.
//! * [`PriceConverter`] is the injected exchange-rate source.
//! * [`Notifier`] is the injected messaging collaborator (usually a chat bot).
mod catalog_management;
mod data_objects;
mod notifier;
mod order_engine_database;
mod price_converter;

pub use catalog_management::CatalogManagement;
pub use data_objects::{Allocation, AllocationRequest, Page, PageRequest, PaidTransition, ReclaimedOrders};
pub use notifier::{Attachment, Notifier, NotifierError};
pub use order_engine_database::{OrderEngineDatabase, OrderFlowError};
pub use price_converter::{PriceConversionError, PriceConverter};
