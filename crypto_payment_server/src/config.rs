use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use cpg_common::helpers::{parse_boolean_flag, split_list};
use crypto_payment_engine::{
    config::DEFAULT_ORDER_LIFETIME_SECS,
    db_types::{PaymentOption, WalletPolicy},
    CurrencyTable,
    EngineConfig,
    FixedRateConverter,
};
use log::*;

use crate::errors::ServerError;

const DEFAULT_MAX_DB_CONNECTIONS: u32 = 25;
const DEFAULT_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_db_connections: u32,
    /// Apply the database migrations before the engine starts.
    pub auto_migrate: bool,
    /// How often the expiry sweeper runs.
    pub sweep_interval: StdDuration,
    pub engine: EngineConfig,
    pub exchange_rates: FixedRateConverter,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
            auto_migrate: true,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            engine: EngineConfig::default(),
            exchange_rates: FixedRateConverter::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(database_url: &str, engine: EngineConfig) -> Self {
        Self { database_url: database_url.to_string(), engine, ..Default::default() }
    }

    /// Reads the configuration from `CPG_*` environment variables. Values that cannot be parsed fall back to their
    /// defaults, except for the database URL and the wallet policy, which must be valid.
    pub fn from_env_or_default() -> Result<Self, ServerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any key-value source, e.g. the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where F: Fn(&str) -> Option<String> {
        let database_url = lookup("CPG_DATABASE_URL").filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            ServerError::ConfigurationError("CPG_DATABASE_URL is not set. Set it to the URL of the database.".into())
        })?;
        let wallet_policy = match lookup("CPG_WALLET_POLICY") {
            Some(s) => WalletPolicy::from_str(&s)
                .map_err(|e| ServerError::ConfigurationError(format!("{e} [CPG_WALLET_POLICY]")))?,
            None => {
                info!("🪛️ CPG_WALLET_POLICY is not set. Using the exclusive wallet policy.");
                WalletPolicy::Exclusive
            },
        };
        let max_db_connections =
            parse_or_default(lookup("CPG_MAX_DB_CONNECTIONS"), "CPG_MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS);
        let auto_migrate = parse_boolean_flag(lookup("CPG_AUTO_MIGRATE"), true);
        let lifetime_secs =
            parse_or_default(lookup("CPG_ORDER_LIFETIME_SECS"), "CPG_ORDER_LIFETIME_SECS", DEFAULT_ORDER_LIFETIME_SECS);
        let order_lifetime = if lifetime_secs > 0 {
            Duration::seconds(lifetime_secs)
        } else {
            warn!("🪛️ CPG_ORDER_LIFETIME_SECS must be positive. Using the default of {DEFAULT_ORDER_LIFETIME_SECS}s.");
            Duration::seconds(DEFAULT_ORDER_LIFETIME_SECS)
        };
        let sweep_secs = parse_or_default(
            lookup("CPG_SWEEP_INTERVAL_SECS"),
            "CPG_SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL.as_secs(),
        );
        let sweep_interval = if sweep_secs > 0 { StdDuration::from_secs(sweep_secs) } else { DEFAULT_SWEEP_INTERVAL };
        let currencies = lookup("CPG_CURRENCY_SETTINGS").map(|s| CurrencyTable::from_list(&s)).unwrap_or_default();
        let payment_options = lookup("CPG_PAYMENT_METHODS").map(|s| payment_options(&s)).unwrap_or_default();
        if payment_options.is_empty() {
            info!("🪛️ No payment methods are configured. Every payment method is enabled.");
        }
        let exchange_rates = lookup("CPG_FIXED_EXCHANGE_RATES")
            .and_then(|s| {
                FixedRateConverter::from_json(&s)
                    .map_err(|e| warn!("🪛️ Ignoring CPG_FIXED_EXCHANGE_RATES. {e}"))
                    .ok()
            })
            .unwrap_or_default();
        if exchange_rates.is_empty() {
            warn!("🪛️ No exchange rates are configured. Products can only be sold in the currency they are priced in.");
        }
        let engine = EngineConfig::new(wallet_policy)
            .with_order_lifetime(order_lifetime)
            .with_currencies(currencies)
            .with_payment_options(payment_options);
        Ok(Self { database_url, max_db_connections, auto_migrate, sweep_interval, engine, exchange_rates })
    }
}

fn parse_or_default<T>(value: Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e}. Using the default, {default}, instead.");
            default
        }),
        None => default,
    }
}

fn payment_options(s: &str) -> Vec<PaymentOption> {
    split_list(s)
        .into_iter()
        .filter_map(|entry| {
            entry.parse::<PaymentOption>().map_err(|e| warn!("🪛️ Ignoring payment method '{entry}'. {e}")).ok()
        })
        .collect()
}
