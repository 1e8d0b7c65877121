use {
    super::{signature, yookassa::PaymentObject},
    crate::domain::{
        error::PipelineError,
        money::{Currency, DecimalAmount, Money, MoneyAmount},
        order::Order,
        payment::{CreatedPayment, PaymentStatus, PaymentStatusView, WebhookEvent},
        provider::{PaymentProvider, ProviderKind},
    },
    async_trait::async_trait,
    chrono::Utc,
    serde::Deserialize,
};

/// Local gateway for development and tests: no network, HMAC-signed
/// webhooks shaped like YooKassa's.
pub struct MockProvider {
    webhook_secret: String,
    base_url: String,
}

impl MockProvider {
    pub fn new(webhook_secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            base_url: base_url.into(),
        }
    }

    /// Signature a well-behaved mock gateway would send for `payload`.
    pub fn sign(&self, payload: &[u8]) -> Result<String, PipelineError> {
        signature::hex_digest(self.webhook_secret.as_bytes(), payload)
    }
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(default)]
    id: Option<String>,
    object: PaymentObject,
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn create_payment(&self, order: &Order) -> Result<CreatedPayment, PipelineError> {
        let provider_payment_id = format!("mock_{}_{}", order.id, Utc::now().timestamp_millis());
        let checkout_url = format!(
            "{}/mock-checkout/{provider_payment_id}",
            self.base_url.trim_end_matches('/')
        );
        Ok(CreatedPayment {
            provider_payment_id,
            checkout_url,
        })
    }

    fn validate_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PipelineError> {
        signature::verify_hex(self.webhook_secret.as_bytes(), payload, signature)?;

        let notification: Notification = serde_json::from_slice(payload)
            .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;
        let event_id = notification.id.filter(|id| !id.is_empty());
        notification.object.into_event(event_id)
    }

    async fn get_payment_status(
        &self,
        provider_payment_id: &str,
    ) -> Result<PaymentStatusView, PipelineError> {
        // The mock gateway keeps no state; the store is the source of truth.
        Ok(PaymentStatusView {
            id: provider_payment_id.to_string(),
            status: PaymentStatus::AwaitingPayment.as_str().to_string(),
            amount: DecimalAmount::from(Money::new(MoneyAmount::ZERO, Currency::Rub)),
            metadata: serde_json::json!({}),
        })
    }
}
