use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unsupported payment provider: {0}")]
    UnsupportedProvider(String),

    #[error("provider: {0}")]
    Provider(String),

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    #[error("order not found: {0}")]
    OrderNotFound(i64),

    #[error("payment {payment_id} belongs to provider {expected}, webhook came from {actual}")]
    ProviderMismatch {
        payment_id: String,
        expected: String,
        actual: String,
    },

    #[error("notification delivery: {0}")]
    Notification(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}
