use {
    super::error::PipelineError,
    super::order::Order,
    super::payment::{CreatedPayment, PaymentStatusView, WebhookEvent},
    async_trait::async_trait,
    derive_more::Display,
    serde::{Deserialize, Serialize},
    std::str::FromStr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[display("mock")]
    Mock,
    #[display("yookassa")]
    YooKassa,
    #[display("cloudpayments")]
    CloudPayments,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::YooKassa => "yookassa",
            Self::CloudPayments => "cloudpayments",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "yookassa" => Ok(Self::YooKassa),
            "cloudpayments" => Ok(Self::CloudPayments),
            _ => Err(PipelineError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Contract every payment backend implements. Amounts cross this boundary in
/// minor units and statuses in the `ProviderStatus` vocabulary.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_payment(&self, order: &Order) -> Result<CreatedPayment, PipelineError>;

    /// Authenticates `payload` against `signature` before parsing it. Never
    /// touches the network.
    fn validate_webhook(&self, payload: &[u8], signature: &str)
    -> Result<WebhookEvent, PipelineError>;

    async fn get_payment_status(
        &self,
        provider_payment_id: &str,
    ) -> Result<PaymentStatusView, PipelineError>;
}
