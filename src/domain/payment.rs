use {
    super::audit::NewAuditEntry,
    super::error::PipelineError,
    super::id::EventId,
    super::money::{DecimalAmount, Money, MoneyAmount},
    super::order::OrderStatus,
    super::provider::ProviderKind,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Internal payment status. Provider statuses without an internal meaning
/// are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    AwaitingPayment,
    Paid,
    Canceled,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Other(s) => s,
        }
    }

    /// `succeeded → paid`, `canceled → canceled`, anything else unchanged.
    pub fn from_provider(status: &ProviderStatus) -> Self {
        match status {
            ProviderStatus::Succeeded => Self::Paid,
            ProviderStatus::Canceled => Self::Canceled,
            ProviderStatus::Other(s) => Self::from(s.clone()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Canceled)
    }

    /// Order status derived from a payment status. One-way: a paid order is
    /// never pulled back to pending by this mapping alone.
    pub fn order_status(&self) -> OrderStatus {
        match self {
            Self::Paid => OrderStatus::Paid,
            Self::Canceled => OrderStatus::Canceled,
            _ => OrderStatus::Pending,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "awaiting_payment" => Self::AwaitingPayment,
            "paid" => Self::Paid,
            "canceled" => Self::Canceled,
            _ => Self::Other(s),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(s: PaymentStatus) -> Self {
        match s {
            PaymentStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-agnostic status vocabulary every adapter normalises into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderStatus {
    Succeeded,
    Canceled,
    Other(String),
}

impl ProviderStatus {
    /// Accepts both YooKassa (`succeeded`, `canceled`) and CloudPayments
    /// (`Completed`, `Cancelled`) spellings.
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "succeeded" | "completed" => Self::Succeeded,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ProviderStatus {
    fn from(s: String) -> Self {
        Self::normalize(&s)
    }
}

impl From<ProviderStatus> for String {
    fn from(s: ProviderStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full payment record from the store.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub provider_payment_id: String,
    pub order_id: i64,
    pub money: Money,
    pub status: PaymentStatus,
    pub provider: String,
    pub checkout_url: String,
    pub webhook_event_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status_view(&self) -> PaymentStatusView {
        PaymentStatusView {
            id: self.provider_payment_id.clone(),
            status: self.status.as_str().to_string(),
            amount: DecimalAmount::from(self.money),
            metadata: self.metadata.clone(),
        }
    }
}

pub struct NewPaymentParams {
    pub provider_payment_id: String,
    pub order_id: i64,
    pub money: Money,
    pub provider: ProviderKind,
    pub checkout_url: String,
    pub metadata: serde_json::Value,
}

/// For INSERT — new payments always start in `awaiting_payment`.
#[derive(Debug, Clone)]
pub struct NewPayment {
    provider_payment_id: String,
    order_id: i64,
    money: Money,
    provider: ProviderKind,
    checkout_url: String,
    metadata: serde_json::Value,
}

impl NewPayment {
    pub fn new(p: NewPaymentParams) -> Self {
        Self {
            provider_payment_id: p.provider_payment_id,
            order_id: p.order_id,
            money: p.money,
            provider: p.provider,
            checkout_url: p.checkout_url,
            metadata: p.metadata,
        }
    }

    pub fn provider_payment_id(&self) -> &str {
        &self.provider_payment_id
    }

    pub fn order_id(&self) -> i64 {
        self.order_id
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::AwaitingPayment
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn checkout_url(&self) -> &str {
        &self.checkout_url
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn audit_entry(&self, actor: &str) -> NewAuditEntry {
        NewAuditEntry::new(
            "payment",
            &self.provider_payment_id,
            "payment_created",
            actor,
            serde_json::json!({
                "order_id": self.order_id,
                "amount": self.money.amount().minor_units(),
                "currency": self.money.currency().as_str(),
                "provider": self.provider.as_str(),
            }),
        )
    }
}

/// Normalised webhook notification, identical for every provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookEvent {
    pub provider_payment_id: String,
    pub status: ProviderStatus,
    pub amount: MoneyAmount,
    pub currency: Option<String>,
    pub order_id: Option<i64>,
    pub event_id: Option<EventId>,
}

impl WebhookEvent {
    /// Parses a provider-built delivery ID. A bad ID makes the payload malformed.
    pub fn event_id_from(raw: Option<String>) -> Result<Option<EventId>, PipelineError> {
        raw.map(EventId::new)
            .transpose()
            .map_err(|e| PipelineError::MalformedPayload(e.to_string()))
    }
}

/// What `PaymentStore::apply_webhook` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookApply {
    /// Status written; carries the payment as it was before the write.
    Applied(Payment),
    /// Event ID already recorded — nothing written.
    Duplicate,
}

// Payment carries timestamps, compare by identity and status only.
impl PartialEq for Payment {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.provider_payment_id == other.provider_payment_id
            && self.status == other.status
            && self.webhook_event_id == other.webhook_event_id
    }
}

impl Eq for Payment {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        order_id: i64,
        previous_status: PaymentStatus,
        payment_status: PaymentStatus,
        order_status: OrderStatus,
    },
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct ProcessedWebhook {
    pub event: WebhookEvent,
    pub outcome: WebhookOutcome,
}

impl ProcessedWebhook {
    /// Stock leaves the warehouse once per payment: on the applied
    /// `succeeded` delivery that moves it into `paid`. A payment that was
    /// already paid, by an earlier event or by mock completion, releases
    /// nothing.
    pub fn should_decrease_stock(&self) -> bool {
        match &self.outcome {
            WebhookOutcome::Applied {
                previous_status, ..
            } => {
                self.event.status == ProviderStatus::Succeeded
                    && *previous_status != PaymentStatus::Paid
            }
            WebhookOutcome::Duplicate => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPayment {
    pub provider_payment_id: String,
    pub checkout_url: String,
}

/// Normalised status object returned by `GET /payments/status/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusView {
    pub id: String,
    pub status: String,
    pub amount: DecimalAmount,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_mapping() {
        assert_eq!(
            PaymentStatus::from_provider(&ProviderStatus::Succeeded),
            PaymentStatus::Paid
        );
        assert_eq!(
            PaymentStatus::from_provider(&ProviderStatus::Canceled),
            PaymentStatus::Canceled
        );
        assert_eq!(
            PaymentStatus::from_provider(&ProviderStatus::normalize("waiting_for_capture")),
            PaymentStatus::Other("waiting_for_capture".into())
        );
    }

    #[test]
    fn awaiting_payment_passes_through_as_known_status() {
        let status = PaymentStatus::from_provider(&ProviderStatus::normalize("awaiting_payment"));
        assert_eq!(status, PaymentStatus::AwaitingPayment);
        assert_eq!(status.order_status(), OrderStatus::Pending);
    }

    #[test]
    fn cloudpayments_spellings_normalise() {
        assert_eq!(ProviderStatus::normalize("Completed"), ProviderStatus::Succeeded);
        assert_eq!(ProviderStatus::normalize("Cancelled"), ProviderStatus::Canceled);
        assert_eq!(
            ProviderStatus::normalize("Declined"),
            ProviderStatus::Other("declined".into())
        );
    }

    #[test]
    fn order_status_derivation() {
        assert_eq!(PaymentStatus::Paid.order_status(), OrderStatus::Paid);
        assert_eq!(PaymentStatus::Canceled.order_status(), OrderStatus::Canceled);
        assert_eq!(
            PaymentStatus::Other("failed".into()).order_status(),
            OrderStatus::Pending
        );
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_value(PaymentStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "awaiting_payment");
        let other: PaymentStatus = serde_json::from_value(serde_json::json!("refunded")).unwrap();
        assert_eq!(other, PaymentStatus::Other("refunded".into()));
    }

    fn processed(status: ProviderStatus, outcome: WebhookOutcome) -> ProcessedWebhook {
        ProcessedWebhook {
            event: WebhookEvent {
                provider_payment_id: "mock_1_1".into(),
                status,
                amount: MoneyAmount::new(10000).unwrap(),
                currency: Some("RUB".into()),
                order_id: Some(1),
                event_id: None,
            },
            outcome,
        }
    }

    fn applied(previous_status: PaymentStatus) -> WebhookOutcome {
        WebhookOutcome::Applied {
            order_id: 1,
            previous_status,
            payment_status: PaymentStatus::Paid,
            order_status: OrderStatus::Paid,
        }
    }

    #[test]
    fn stock_released_only_on_transition_into_paid() {
        assert!(
            processed(ProviderStatus::Succeeded, applied(PaymentStatus::AwaitingPayment))
                .should_decrease_stock()
        );
        assert!(
            !processed(ProviderStatus::Succeeded, applied(PaymentStatus::Paid))
                .should_decrease_stock()
        );
        assert!(
            !processed(ProviderStatus::Canceled, applied(PaymentStatus::AwaitingPayment))
                .should_decrease_stock()
        );
        assert!(!processed(ProviderStatus::Succeeded, WebhookOutcome::Duplicate).should_decrease_stock());
    }
}
