pub mod audit_repo;
pub mod order_repo;
pub mod payment_repo;
pub mod user_repo;

use {
    crate::domain::{
        audit::NewAuditEntry,
        error::PipelineError,
        id::EventId,
        order::{NewOrder, Order, OrderStatus},
        payment::{NewPayment, Payment, PaymentStatus, WebhookApply},
        store::{AuditLog, OrderStore, PaymentStore, UserStore},
        user::User,
    },
    async_trait::async_trait,
    sqlx::PgPool,
};

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, PipelineError> {
        order_repo::insert_order(&self.pool, order).await
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, PipelineError> {
        order_repo::get_order(&self.pool, id).await
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<(), PipelineError> {
        order_repo::update_status(&self.pool, id, status).await
    }

    async fn update_order_payment_id(
        &self,
        id: i64,
        provider_payment_id: &str,
    ) -> Result<(), PipelineError> {
        order_repo::update_payment_id(&self.pool, id, provider_payment_id).await
    }

    async fn decrease_stock(&self, order_id: i64) -> Result<(), PipelineError> {
        order_repo::decrease_stock(&self.pool, order_id).await
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, PipelineError> {
        payment_repo::insert_payment(&self.pool, payment).await
    }

    async fn get_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, PipelineError> {
        payment_repo::get_by_provider_id(&self.pool, provider_payment_id).await
    }

    async fn get_by_webhook_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<Payment>, PipelineError> {
        payment_repo::get_by_webhook_event_id(&self.pool, event_id).await
    }

    async fn apply_webhook(
        &self,
        provider_payment_id: &str,
        status: &PaymentStatus,
        event_id: Option<&EventId>,
    ) -> Result<WebhookApply, PipelineError> {
        payment_repo::apply_webhook(&self.pool, provider_payment_id, status, event_id).await
    }

    async fn force_status(
        &self,
        provider_payment_id: &str,
        status: &PaymentStatus,
    ) -> Result<(), PipelineError> {
        payment_repo::force_status(&self.pool, provider_payment_id, status).await
    }

    async fn list_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PipelineError> {
        payment_repo::list_for_order(&self.pool, order_id).await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, PipelineError> {
        user_repo::get_user(&self.pool, id).await
    }
}

#[async_trait]
impl AuditLog for PgStore {
    async fn record(&self, entry: &NewAuditEntry) -> Result<(), PipelineError> {
        audit_repo::insert_audit_entry(&self.pool, entry).await
    }
}
