use {
    crate::domain::{
        error::PipelineError,
        notification::{Mailer, PaymentNotification},
    },
    async_trait::async_trait,
};

/// Writes each notification to the log. Stands in for the real e-mail
/// service, which lives outside this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_payment_notification(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), PipelineError> {
        tracing::info!(
            to = %notification.to,
            order_id = notification.order_id,
            payment_id = %notification.provider_payment_id,
            amount = %notification.amount.amount().to_decimal_string(),
            currency = %notification.amount.currency(),
            status = %notification.status,
            "payment notification"
        );
        Ok(())
    }
}
