use {
    super::{signature, yookassa::order_id_from_metadata},
    crate::domain::{
        error::PipelineError,
        money::MoneyAmount,
        order::Order,
        payment::{CreatedPayment, PaymentStatusView, ProviderStatus, WebhookEvent},
        provider::{PaymentProvider, ProviderKind},
    },
    async_trait::async_trait,
    chrono::Utc,
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

pub const DEFAULT_API_URL: &str = "https://api.cloudpayments.ru";

#[derive(Debug, Clone)]
pub struct CloudPaymentsConfig {
    pub public_id: String,
    pub api_secret: String,
    pub api_url: String,
}

pub struct CloudPaymentsProvider {
    client: reqwest::Client,
    config: CloudPaymentsConfig,
}

impl CloudPaymentsProvider {
    pub fn new(config: CloudPaymentsConfig, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PaymentProvider for CloudPaymentsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudPayments
    }

    async fn create_payment(&self, order: &Order) -> Result<CreatedPayment, PipelineError> {
        let invoice_id = format!("cp_{}_{}", order.id, Utc::now().timestamp());
        let body = CreateOrderRequest::new(order, invoice_id.clone())?;

        let resp = self
            .client
            .post(format!(
                "{}/orders/create",
                self.config.api_url.trim_end_matches('/')
            ))
            .basic_auth(&self.config.public_id, Some(&self.config.api_secret))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(PipelineError::Provider(format!(
                "CloudPayments API error ({status}): {text}"
            )));
        }

        let created: CreateOrderResponse = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Provider(format!("CloudPayments response: {e}")))?;
        if !created.success {
            return Err(PipelineError::Provider(format!(
                "CloudPayments rejected order: {}",
                created.message.unwrap_or_default()
            )));
        }
        let model = created.model.ok_or_else(|| {
            PipelineError::Provider("CloudPayments response has no Model".into())
        })?;

        Ok(CreatedPayment {
            provider_payment_id: invoice_id,
            checkout_url: model.url,
        })
    }

    fn validate_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PipelineError> {
        signature::verify_base64(self.config.api_secret.as_bytes(), payload, signature)?;

        let n: Notification = serde_json::from_slice(payload)
            .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;
        if n.invoice_id.is_empty() {
            return Err(PipelineError::MalformedPayload("InvoiceId is empty".into()));
        }

        let amount = match &n.amount {
            serde_json::Value::String(s) => MoneyAmount::parse_decimal(s),
            serde_json::Value::Number(num) => MoneyAmount::parse_decimal(&num.to_string()),
            other => Err(PipelineError::Validation(format!("Amount is {other}"))),
        }
        .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;

        let data = match n.data {
            Some(serde_json::Value::String(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Some(v) => v,
            None => serde_json::Value::Null,
        };
        let order_id =
            order_id_from_metadata(&data).or_else(|| order_id_from_invoice(&n.invoice_id));

        let status = ProviderStatus::normalize(&n.status);
        let event_id = n
            .transaction_id
            .map(|tx| format!("{}:{}", transaction_id_str(&tx), status.as_str()));

        Ok(WebhookEvent {
            provider_payment_id: n.invoice_id,
            status,
            amount,
            currency: n.currency,
            order_id,
            event_id: WebhookEvent::event_id_from(event_id)?,
        })
    }

    async fn get_payment_status(
        &self,
        provider_payment_id: &str,
    ) -> Result<PaymentStatusView, PipelineError> {
        // TODO: query /payments/find once invoice lookups are needed; until then
        // the status is reported as unknown.
        Ok(PaymentStatusView {
            id: provider_payment_id.to_string(),
            status: "unknown".to_string(),
            amount: crate::domain::money::DecimalAmount {
                value: MoneyAmount::ZERO.to_decimal_string(),
                currency: "RUB".to_string(),
            },
            metadata: serde_json::json!({}),
        })
    }
}

/// `cp_{order}_{ts}` as issued by `create_payment`, or a bare order number.
fn order_id_from_invoice(invoice_id: &str) -> Option<i64> {
    match invoice_id.strip_prefix("cp_") {
        Some(rest) => rest.split('_').next()?.parse().ok(),
        None => invoice_id.parse().ok(),
    }
}

fn transaction_id_str(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateOrderRequest {
    /// Major units as a JSON number.
    amount: serde_json::Number,
    currency: &'static str,
    description: String,
    invoice_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<String>,
    json_data: serde_json::Value,
}

impl CreateOrderRequest {
    fn new(order: &Order, invoice_id: String) -> Result<Self, PipelineError> {
        let decimal = order.amount().to_decimal_string();
        let amount = decimal
            .parse::<serde_json::Number>()
            .map_err(|e| PipelineError::Validation(format!("amount {decimal}: {e}")))?;
        Ok(Self {
            amount,
            currency: order.money.currency().as_str(),
            description: format!("Заказ №{}", order.id),
            invoice_id,
            account_id: order.user_id.map(|id| id.to_string()),
            json_data: serde_json::json!({ "order_id": order.id }),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateOrderResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    model: Option<CreatedOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedOrder {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Notification {
    #[serde(default)]
    transaction_id: Option<serde_json::Value>,
    invoice_id: String,
    status: String,
    amount: serde_json::Value,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> CloudPaymentsProvider {
        CloudPaymentsProvider::new(
            CloudPaymentsConfig {
                public_id: "pk_test".into(),
                api_secret: "cp-secret".into(),
                api_url: DEFAULT_API_URL.into(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn sign(body: &[u8]) -> String {
        signature::base64_digest(b"cp-secret", body).unwrap()
    }

    #[test]
    fn completed_notification_with_numeric_amount() {
        let body = serde_json::to_vec(&serde_json::json!({
            "TransactionId": 504,
            "InvoiceId": "cp_17_1700000000",
            "Amount": 100.5,
            "Currency": "RUB",
            "Status": "Completed",
            "Data": "{\"order_id\": 17}"
        }))
        .unwrap();

        let event = provider().validate_webhook(&body, &sign(&body)).unwrap();
        assert_eq!(event.provider_payment_id, "cp_17_1700000000");
        assert_eq!(event.status, ProviderStatus::Succeeded);
        assert_eq!(event.amount.minor_units(), 10050);
        assert_eq!(event.order_id, Some(17));
        assert_eq!(event.event_id.as_deref(), Some("504:succeeded"));
    }

    #[test]
    fn string_amount_and_order_from_invoice() {
        let body = serde_json::to_vec(&serde_json::json!({
            "InvoiceId": "cp_9_1700000000",
            "Amount": "250.00",
            "Status": "Declined"
        }))
        .unwrap();

        let event = provider().validate_webhook(&body, &sign(&body)).unwrap();
        assert_eq!(event.amount.minor_units(), 25000);
        assert_eq!(event.order_id, Some(9));
        assert_eq!(event.status, ProviderStatus::Other("declined".into()));
        assert_eq!(event.event_id, None);
    }

    #[test]
    fn hex_signature_is_not_accepted() {
        let body = br#"{"InvoiceId":"1","Amount":"1.00","Status":"Completed"}"#;
        let hex = signature::hex_digest(b"cp-secret", body).unwrap();
        let err = provider().validate_webhook(body, &hex).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn status_lookup_is_a_stub() {
        let view = provider().get_payment_status("cp_1_1").await.unwrap();
        assert_eq!(view.status, "unknown");
        assert_eq!(view.amount.value, "0.00");
    }

    #[test]
    fn invoice_parsing() {
        assert_eq!(order_id_from_invoice("cp_12_1700"), Some(12));
        assert_eq!(order_id_from_invoice("33"), Some(33));
        assert_eq!(order_id_from_invoice("cp_x"), None);
    }

    #[test]
    fn order_amount_is_sent_as_exact_decimal() {
        use crate::domain::{
            money::{Currency, Money},
            order::{OrderItem, OrderStatus},
        };

        let order = Order {
            id: 5,
            user_id: Some(8),
            items: vec![OrderItem {
                product_id: 1,
                quantity: 1,
                price_cents: 1999,
            }],
            money: Money::new(MoneyAmount::new(1999).unwrap(), Currency::Rub),
            status: OrderStatus::Pending,
            payment_id: None,
            shipping_address: serde_json::json!({}),
            created_at: Utc::now(),
        };
        let request = CreateOrderRequest::new(&order, "cp_5_1".into()).unwrap();
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""Amount":19.99"#), "{json}");
        assert!(json.contains(r#""AccountId":"8""#), "{json}");
    }
}
