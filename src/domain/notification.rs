use {
    super::{error::PipelineError, money::Money, payment::PaymentStatus},
    async_trait::async_trait,
};

/// What the customer is told after a payment changes state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub to: String,
    pub order_id: i64,
    pub provider_payment_id: String,
    pub amount: Money,
    pub status: PaymentStatus,
}

/// Outbound e-mail. Template rendering and delivery live behind this seam.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_payment_notification(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), PipelineError>;
}
