use crypto_payment_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Could not initialize server. {0}")]
    InitializationError(String),
    #[error("An error occurred in the database. {0}")]
    DatabaseError(String),
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
