use std::collections::HashMap;

use cpg_common::Amount;
use log::trace;
use rust_decimal::Decimal;

use crate::traits::{PriceConversionError, PriceConverter};

/// A [`PriceConverter`] backed by a fixed table of rates.
///
/// A rate `r` from `A` to `B` means one unit of `A` buys `r` units of `B`. If only the `B` to `A` rate is known, its
/// inverse is used. Converting a currency to itself always succeeds at 1:1.
#[derive(Debug, Clone, Default)]
pub struct FixedRateConverter {
    rates: HashMap<(String, String), Decimal>,
}

impl FixedRateConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Amount) -> Self {
        self.rates.insert((from.to_ascii_uppercase(), to.to_ascii_uppercase()), rate.value());
        self
    }

    /// Loads rates from a JSON object of the form `{"CNY": {"USDT": "0.14", "TRX": 0.9}}`.
    pub fn from_json(json: &str) -> Result<Self, PriceConversionError> {
        let table = serde_json::from_str::<HashMap<String, HashMap<String, Amount>>>(json)
            .map_err(|e| PriceConversionError::SourceUnavailable(format!("Invalid rate table. {e}")))?;
        let converter = table.into_iter().fold(Self::new(), |converter, (from, targets)| {
            targets.into_iter().fold(converter, |c, (to, rate)| c.with_rate(&from, &to, rate))
        });
        Ok(converter)
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate(&self, from: &str, to: &str) -> Option<Decimal> {
        let from = from.to_ascii_uppercase();
        let to = to.to_ascii_uppercase();
        if from == to {
            return Some(Decimal::ONE);
        }
        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return Some(*rate);
        }
        self.rates.get(&(to, from)).filter(|r| !r.is_zero()).and_then(|r| Decimal::ONE.checked_div(*r))
    }
}

impl PriceConverter for FixedRateConverter {
    async fn convert(&self, amount: Amount, from: &str, to: &str) -> Result<Amount, PriceConversionError> {
        let rate = self
            .rate(from, to)
            .ok_or_else(|| PriceConversionError::RateDoesNotExist { from: from.to_string(), to: to.to_string() })?;
        let converted = amount
            .value()
            .checked_mul(rate)
            .ok_or_else(|| PriceConversionError::InvalidResult(format!("{amount} {from} x {rate} overflows")))?;
        trace!("💱️ {amount} {from} = {converted} {to} at {rate}");
        Ok(Amount::new(converted))
    }
}
