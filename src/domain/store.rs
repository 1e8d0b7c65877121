use {
    super::audit::NewAuditEntry,
    super::error::PipelineError,
    super::id::EventId,
    super::order::{NewOrder, Order, OrderStatus},
    super::payment::{NewPayment, Payment, PaymentStatus, WebhookApply},
    super::user::User,
    async_trait::async_trait,
};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, PipelineError>;

    async fn get_order(&self, id: i64) -> Result<Option<Order>, PipelineError>;

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<(), PipelineError>;

    async fn update_order_payment_id(
        &self,
        id: i64,
        provider_payment_id: &str,
    ) -> Result<(), PipelineError>;

    /// Takes the order's line quantities out of product stock.
    async fn decrease_stock(&self, order_id: i64) -> Result<(), PipelineError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, PipelineError>;

    async fn get_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, PipelineError>;

    async fn get_by_webhook_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<Payment>, PipelineError>;

    /// Writes `status` (and `event_id`, when present) onto the payment in one
    /// unit. An event ID seen before yields `Duplicate` with nothing written;
    /// an unknown payment yields `PaymentNotFound`.
    async fn apply_webhook(
        &self,
        provider_payment_id: &str,
        status: &PaymentStatus,
        event_id: Option<&EventId>,
    ) -> Result<WebhookApply, PipelineError>;

    /// Unconditional status write, used by the mock completion path.
    async fn force_status(
        &self,
        provider_payment_id: &str,
        status: &PaymentStatus,
    ) -> Result<(), PipelineError>;

    /// Newest first.
    async fn list_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PipelineError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>, PipelineError>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: &NewAuditEntry) -> Result<(), PipelineError>;
}

/// Everything the orchestrator and the notifier persist through.
pub trait Store: OrderStore + PaymentStore + UserStore + AuditLog {}

impl<T> Store for T where T: OrderStore + PaymentStore + UserStore + AuditLog {}
