use std::{collections::HashMap, fmt::Display, str::FromStr};

use chrono::Duration;
use cpg_common::Amount;
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{PaymentOption, WalletPolicy};

pub const DEFAULT_ORDER_LIFETIME_SECS: i64 = 30 * 60;
pub const DEFAULT_MAX_SLOTS: u32 = 100;

#[derive(Debug, Clone, Error)]
#[error("Invalid configuration. {0}")]
pub struct ConfigError(pub String);

//--------------------------------------   CurrencySettings   ---------------------------------------------------------
/// How prices in one settlement currency are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySettings {
    /// The smallest representable increment. Converted prices are truncated to a multiple of this, and price slots
    /// step by this amount.
    pub unit: Amount,
    /// The number of price slots tried before giving up, i.e. slots `0..max_slots`.
    pub max_slots: u32,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self { unit: Amount::new(Decimal::new(1, 2)), max_slots: DEFAULT_MAX_SLOTS }
    }
}

impl FromStr for CurrencySettings {
    type Err = ConfigError;

    /// Parses `unit:max_slots`, e.g. `0.0001:100`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (unit, slots) = s.split_once(':').ok_or_else(|| ConfigError(format!("Expected unit:slots, got {s}")))?;
        let unit = unit.parse::<Amount>().map_err(|e| ConfigError(e.to_string()))?;
        if !unit.is_positive() {
            return Err(ConfigError(format!("The currency unit must be positive, got {unit}")));
        }
        let max_slots =
            slots.trim().parse::<u32>().map_err(|e| ConfigError(format!("Invalid slot count {slots}. {e}")))?;
        Ok(Self { unit, max_slots })
    }
}

//--------------------------------------     CurrencyTable    ---------------------------------------------------------
/// Per-currency settings, with a fallback for currencies that are not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencyTable {
    default: CurrencySettings,
    currencies: HashMap<String, CurrencySettings>,
}

impl CurrencyTable {
    pub fn new(default: CurrencySettings) -> Self {
        Self { default, currencies: HashMap::new() }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S, settings: CurrencySettings) -> Self {
        self.currencies.insert(currency.into().to_ascii_uppercase(), settings);
        self
    }

    pub fn settings_for(&self, currency: &str) -> CurrencySettings {
        self.currencies.get(&currency.to_ascii_uppercase()).copied().unwrap_or(self.default)
    }

    /// Parses a comma-separated list of `CURRENCY:unit:max_slots` entries. Malformed entries are skipped with a
    /// warning.
    pub fn from_list(s: &str) -> Self {
        s.split(',').map(str::trim).filter(|e| !e.is_empty()).fold(Self::default(), |table, entry| {
            match entry.split_once(':').map(|(c, rest)| (c.trim(), rest.parse::<CurrencySettings>())) {
                Some((currency, Ok(settings))) if !currency.is_empty() => table.with_currency(currency, settings),
                Some((_, Err(e))) => {
                    warn!("🪛️ Ignoring currency setting '{entry}'. {e}");
                    table
                },
                _ => {
                    warn!("🪛️ Ignoring currency setting '{entry}'. Expected CURRENCY:unit:slots");
                    table
                },
            }
        })
    }
}

//--------------------------------------      EngineConfig    ---------------------------------------------------------
/// The read-only configuration of the order engine. Built once at start-up and handed to the API.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub wallet_policy: WalletPolicy,
    pub order_lifetime: Duration,
    pub currencies: CurrencyTable,
    /// The payment options customers may choose from. An empty list enables every option.
    pub payment_options: Vec<PaymentOption>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wallet_policy: WalletPolicy::Exclusive,
            order_lifetime: Duration::seconds(DEFAULT_ORDER_LIFETIME_SECS),
            currencies: CurrencyTable::default(),
            payment_options: vec![],
        }
    }
}

impl EngineConfig {
    pub fn new(wallet_policy: WalletPolicy) -> Self {
        Self { wallet_policy, ..Default::default() }
    }

    pub fn with_order_lifetime(mut self, lifetime: Duration) -> Self {
        self.order_lifetime = lifetime;
        self
    }

    pub fn with_currencies(mut self, currencies: CurrencyTable) -> Self {
        self.currencies = currencies;
        self
    }

    pub fn with_payment_options(mut self, options: Vec<PaymentOption>) -> Self {
        self.payment_options = options;
        self
    }

    pub fn is_enabled(&self, option: &PaymentOption) -> bool {
        self.payment_options.is_empty() || self.payment_options.contains(option)
    }
}

impl Display for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let options = if self.payment_options.is_empty() {
            "all".to_string()
        } else {
            self.payment_options.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(",")
        };
        write!(
            f,
            "policy: {}, order lifetime: {}s, payment options: {options}",
            self.wallet_policy,
            self.order_lifetime.num_seconds()
        )
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn currency_settings() {
        let s = "0.0001:50".parse::<CurrencySettings>().unwrap();
        assert_eq!(s.unit, Amount::from(dec!(0.0001)));
        assert_eq!(s.max_slots, 50);
        assert!("0:50".parse::<CurrencySettings>().is_err());
        assert!("0.01".parse::<CurrencySettings>().is_err());
        assert!("0.01:many".parse::<CurrencySettings>().is_err());
    }

    #[test]
    fn currency_table() {
        let table = CurrencyTable::from_list("USDT:0.0001:100, trx:0.001:50,BAD:x:1,,NOPE");
        assert_eq!(table.settings_for("usdt").unit, Amount::from(dec!(0.0001)));
        assert_eq!(table.settings_for("TRX").max_slots, 50);
        assert_eq!(table.settings_for("BAD"), CurrencySettings::default());
        assert_eq!(table.settings_for("CNY").unit, Amount::from(dec!(0.01)));
        assert_eq!(table.settings_for("CNY").max_slots, DEFAULT_MAX_SLOTS);
    }

    #[test]
    fn payment_options() {
        let config = EngineConfig::default();
        assert!(config.is_enabled(&PaymentOption::new("USDT", "TRC20")));
        let config = config.with_payment_options(vec![PaymentOption::new("TRX", "TRC20")]);
        assert!(!config.is_enabled(&PaymentOption::new("USDT", "TRC20")));
        assert!(config.is_enabled(&PaymentOption::new("TRX", "TRC20")));
        assert_eq!(config.to_string(), "policy: Exclusive, order lifetime: 1800s, payment options: TRX_TRC20");
    }
}
