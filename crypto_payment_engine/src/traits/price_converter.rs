use cpg_common::Amount;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PriceConversionError {
    #[error("No exchange rate is available from {from} to {to}")]
    RateDoesNotExist { from: String, to: String },
    #[error("The rate source could not be reached. {0}")]
    SourceUnavailable(String),
    #[error("The converted value is not a valid amount. {0}")]
    InvalidResult(String),
}

/// Converts amounts between currencies at the current rate.
///
/// The engine never looks rates up itself. Implementations may call out to an exchange API, or use a fixed table (see
/// [`crate::FixedRateConverter`]).
#[allow(async_fn_in_trait)]
pub trait PriceConverter {
    async fn convert(&self, amount: Amount, from: &str, to: &str) -> Result<Amount, PriceConversionError>;
}
