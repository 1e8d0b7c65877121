use {
    super::signature,
    crate::domain::{
        error::PipelineError,
        money::{DecimalAmount, MoneyAmount},
        order::Order,
        payment::{CreatedPayment, PaymentStatusView, ProviderStatus, WebhookEvent},
        provider::{PaymentProvider, ProviderKind},
    },
    async_trait::async_trait,
    chrono::Utc,
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

pub const DEFAULT_API_URL: &str = "https://api.yookassa.ru/v3";
const IDEMPOTENCE_KEY_HEADER: &str = "Idempotence-Key";
const SIGNATURE_PREFIX: &str = "sha256=";
// VAT 20%.
const RECEIPT_VAT_CODE: u8 = 1;

#[derive(Debug, Clone)]
pub struct YooKassaConfig {
    pub shop_id: String,
    pub secret_key: String,
    pub api_url: String,
    pub return_url: String,
    pub receipt_email: String,
}

pub struct YooKassaProvider {
    client: reqwest::Client,
    config: YooKassaConfig,
}

impl YooKassaProvider {
    pub fn new(config: YooKassaConfig, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn payments_url(&self) -> String {
        format!("{}/payments", self.config.api_url.trim_end_matches('/'))
    }

    /// One receipt line per order item. A negative line price is an error.
    fn receipt(&self, order: &Order) -> Result<Option<Receipt>, PipelineError> {
        if order.items.is_empty() {
            return Ok(None);
        }
        let currency = order.money.currency().as_str();
        let items = order
            .items
            .iter()
            .map(|item| {
                Ok(ReceiptItem {
                    description: format!("Товар {}", item.product_id),
                    quantity: item.quantity.to_string(),
                    amount: DecimalAmount {
                        value: MoneyAmount::new(item.price_cents)?.to_decimal_string(),
                        currency: currency.to_string(),
                    },
                    vat_code: RECEIPT_VAT_CODE,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Ok(Some(Receipt {
            customer: ReceiptCustomer {
                email: self.config.receipt_email.clone(),
            },
            items,
        }))
    }
}

#[async_trait]
impl PaymentProvider for YooKassaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::YooKassa
    }

    async fn create_payment(&self, order: &Order) -> Result<CreatedPayment, PipelineError> {
        let body = CreatePaymentRequest {
            amount: DecimalAmount::from(order.money),
            confirmation: Confirmation {
                confirmation_type: "redirect",
                return_url: format!("{}?order_id={}", self.config.return_url, order.id),
            },
            description: format!("Заказ №{}", order.id),
            capture: true,
            metadata: serde_json::json!({ "order_id": order.id }),
            receipt: self.receipt(order)?,
        };

        let idempotence_key = format!("order_{}_{}", order.id, Utc::now().timestamp());

        let resp = self
            .client
            .post(self.payments_url())
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .header(IDEMPOTENCE_KEY_HEADER, idempotence_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(PipelineError::Provider(format!(
                "YooKassa API error ({status}): {text}"
            )));
        }

        let created: CreatePaymentResponse = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Provider(format!("YooKassa response: {e}")))?;
        let checkout_url = created
            .confirmation
            .and_then(|c| c.confirmation_url)
            .ok_or_else(|| {
                PipelineError::Provider("YooKassa response has no confirmation_url".into())
            })?;

        Ok(CreatedPayment {
            provider_payment_id: created.id,
            checkout_url,
        })
    }

    fn validate_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PipelineError> {
        let presented = signature.trim().strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
            PipelineError::InvalidSignature(format!("expected {SIGNATURE_PREFIX}<hex>"))
        })?;
        signature::verify_hex(self.config.secret_key.as_bytes(), payload, presented)?;

        let notification: Notification = serde_json::from_slice(payload)
            .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;
        // YooKassa sends no delivery ID; event + payment ID is stable across
        // redeliveries of the same notification.
        let event_id = notification
            .event
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| format!("{e}:{}", notification.object.id));

        notification.object.into_event(event_id)
    }

    async fn get_payment_status(
        &self,
        provider_payment_id: &str,
    ) -> Result<PaymentStatusView, PipelineError> {
        let resp = self
            .client
            .get(format!("{}/{provider_payment_id}", self.payments_url()))
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(PipelineError::Provider(format!(
                "YooKassa API error ({status}): {text}"
            )));
        }

        let payment: PaymentObject = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Provider(format!("YooKassa response: {e}")))?;
        Ok(PaymentStatusView {
            id: payment.id,
            status: payment.status,
            amount: payment.amount,
            metadata: payment.metadata,
        })
    }
}

// ── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreatePaymentRequest {
    amount: DecimalAmount,
    confirmation: Confirmation,
    description: String,
    capture: bool,
    metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<Receipt>,
}

#[derive(Debug, Serialize)]
struct Confirmation {
    #[serde(rename = "type")]
    confirmation_type: &'static str,
    return_url: String,
}

#[derive(Debug, Serialize)]
struct Receipt {
    customer: ReceiptCustomer,
    items: Vec<ReceiptItem>,
}

#[derive(Debug, Serialize)]
struct ReceiptCustomer {
    email: String,
}

#[derive(Debug, Serialize)]
struct ReceiptItem {
    description: String,
    quantity: String,
    amount: DecimalAmount,
    vat_code: u8,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    id: String,
    #[serde(default)]
    confirmation: Option<ConfirmationResponse>,
}

#[derive(Debug, Deserialize)]
struct ConfirmationResponse {
    #[serde(default)]
    confirmation_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(default)]
    event: Option<String>,
    object: PaymentObject,
}

/// Payment object as YooKassa (and the mock gateway, which imitates it)
/// puts it on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct PaymentObject {
    pub id: String,
    pub status: String,
    pub amount: DecimalAmount,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PaymentObject {
    pub(crate) fn into_event(self, event_id: Option<String>) -> Result<WebhookEvent, PipelineError> {
        if self.id.is_empty() {
            return Err(PipelineError::MalformedPayload("object.id is empty".into()));
        }
        let amount = MoneyAmount::parse_decimal(&self.amount.value)
            .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;

        Ok(WebhookEvent {
            order_id: order_id_from_metadata(&self.metadata),
            provider_payment_id: self.id,
            status: ProviderStatus::normalize(&self.status),
            amount,
            currency: Some(self.amount.currency),
            event_id: WebhookEvent::event_id_from(event_id)?,
        })
    }
}

/// `metadata.order_id` as a number, or a numeric string.
pub(crate) fn order_id_from_metadata(metadata: &serde_json::Value) -> Option<i64> {
    match metadata.get("order_id")? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
