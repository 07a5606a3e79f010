//! # Crypto payment server
//! Runs the order engine as a long-lived process. It is responsible for:
//! * Loading the engine configuration from `CPG_*` environment variables.
//! * Opening the database and bringing the schema up to date.
//! * Running the expiry sweeper, which closes unpaid orders once their lifetime has passed and returns their wallets,
//!   price slots and product items to the pool.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod expiry_worker;
pub mod notifier;
pub mod server;
