use {
    super::notifier::{NotificationJob, Notifier},
    crate::{
        adapters::providers::ProviderRegistry,
        domain::{
            audit::NewAuditEntry,
            error::PipelineError,
            payment::{
                CreatedPayment, NewPayment, NewPaymentParams, Payment, PaymentStatus,
                PaymentStatusView, ProcessedWebhook, WebhookApply, WebhookOutcome,
            },
            provider::ProviderKind,
            store::Store,
        },
        metrics::Metrics,
    },
    std::sync::Arc,
    tracing::Span,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCompletion {
    pub provider_payment_id: String,
    pub order_id: i64,
}

/// Ties providers to the stores: creates payments, applies webhooks, keeps
/// orders in step with their payments.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    store: Arc<dyn Store>,
    providers: ProviderRegistry,
    notifier: Notifier,
    metrics: Arc<Metrics>,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        providers: ProviderRegistry,
        notifier: Notifier,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            providers,
            notifier,
            metrics,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    #[tracing::instrument(name = "create_payment", skip(self))]
    pub async fn create_payment(&self, order_id: i64) -> Result<CreatedPayment, PipelineError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(PipelineError::OrderNotFound(order_id))?;
        if order.amount().is_zero() {
            return Err(PipelineError::Validation(format!(
                "order {order_id} has nothing to pay"
            )));
        }

        let provider = self.providers.default_provider()?;
        let created = provider.create_payment(&order).await.inspect_err(|e| {
            self.metrics.payment_create_failed();
            tracing::error!(provider = %provider.kind(), error = %e, "provider refused payment");
        })?;

        let new_payment = NewPayment::new(NewPaymentParams {
            provider_payment_id: created.provider_payment_id.clone(),
            order_id,
            money: order.money,
            provider: provider.kind(),
            checkout_url: created.checkout_url.clone(),
            metadata: serde_json::json!({ "order_id": order_id }),
        });
        self.store.create_payment(&new_payment).await?;
        self.metrics.payment_created();

        // The payment exists at the provider and in the store from here on;
        // nothing below may fail the request.
        self.audit(new_payment.audit_entry("api")).await;
        if let Err(e) = self
            .store
            .update_order_payment_id(order_id, &created.provider_payment_id)
            .await
        {
            tracing::warn!(error = %e, "failed to attach payment to order");
        }

        tracing::info!(
            payment_id = %created.provider_payment_id,
            provider = %provider.kind(),
            "payment created"
        );
        Ok(created)
    }

    /// Validate, deduplicate and apply one provider notification. `provider`
    /// names the backend that must vouch for the payload; `None` means the
    /// configured default.
    #[tracing::instrument(
        name = "webhook",
        skip_all,
        fields(
            provider = tracing::field::Empty,
            event_id = tracing::field::Empty,
            payment_id = tracing::field::Empty,
        )
    )]
    pub async fn process_webhook(
        &self,
        provider: Option<&str>,
        payload: &[u8],
        signature: &str,
    ) -> Result<ProcessedWebhook, PipelineError> {
        let provider = match provider {
            Some(name) => self.providers.get(name),
            None => self.providers.default_provider(),
        }
        .inspect_err(|_| self.metrics.webhook_rejected())?;
        let kind = provider.kind();
        Span::current().record("provider", kind.as_str());

        let event = provider
            .validate_webhook(payload, signature)
            .inspect_err(|e| {
                self.metrics.webhook_rejected();
                tracing::warn!(error = %e, "webhook rejected");
            })?;
        Span::current().record("payment_id", event.provider_payment_id.as_str());
        if let Some(event_id) = &event.event_id {
            Span::current().record("event_id", event_id.as_str());
        }

        let seen = match &event.event_id {
            Some(event_id) => self.store.get_by_webhook_event_id(event_id).await?.is_some(),
            None => false,
        };
        if seen {
            self.metrics.webhook_duplicate();
            tracing::info!("duplicate event, already processed");
            return Ok(ProcessedWebhook {
                event,
                outcome: WebhookOutcome::Duplicate,
            });
        }

        let payment = self
            .store
            .get_by_provider_id(&event.provider_payment_id)
            .await?
            .ok_or_else(|| PipelineError::PaymentNotFound(event.provider_payment_id.clone()))?;
        if payment.provider != kind.as_str() {
            self.metrics.webhook_rejected();
            return Err(PipelineError::ProviderMismatch {
                payment_id: payment.provider_payment_id,
                expected: payment.provider,
                actual: kind.to_string(),
            });
        }
        if event.amount != payment.money.amount() {
            tracing::warn!(
                expected = payment.money.amount().minor_units(),
                received = event.amount.minor_units(),
                "webhook amount differs from stored payment"
            );
        }

        let payment_status = PaymentStatus::from_provider(&event.status);
        let applied = self
            .store
            .apply_webhook(
                &event.provider_payment_id,
                &payment_status,
                event.event_id.as_ref(),
            )
            .await?;

        let before = match applied {
            WebhookApply::Applied(before) => before,
            WebhookApply::Duplicate => {
                self.metrics.webhook_duplicate();
                tracing::info!("duplicate event, lost the race to a concurrent delivery");
                return Ok(ProcessedWebhook {
                    event,
                    outcome: WebhookOutcome::Duplicate,
                });
            }
        };

        self.audit(NewAuditEntry::new(
            "payment",
            &before.provider_payment_id,
            "status_changed",
            &format!("webhook:{kind}"),
            serde_json::json!({
                "event_id": event.event_id,
                "old_status": before.status.as_str(),
                "new_status": payment_status.as_str(),
            }),
        ))
        .await;

        let order_status = payment_status.order_status();
        if let Err(e) = self
            .store
            .update_order_status(before.order_id, order_status)
            .await
        {
            tracing::warn!(order_id = before.order_id, error = %e, "failed to sync order status");
        }

        self.notifier
            .enqueue(NotificationJob {
                order_id: before.order_id,
                provider_payment_id: before.provider_payment_id.clone(),
                amount: before.money,
                status: payment_status.clone(),
            })
            .await;

        self.metrics.webhook_applied();
        tracing::info!(
            from = %before.status,
            to = %payment_status,
            order_id = before.order_id,
            "webhook applied"
        );

        Ok(ProcessedWebhook {
            event,
            outcome: WebhookOutcome::Applied {
                order_id: before.order_id,
                previous_status: before.status,
                payment_status,
                order_status,
            },
        })
    }

    /// Take the order's goods out of stock when a delivery moved the payment
    /// into `paid`. Failures are logged only.
    pub async fn release_stock(&self, processed: &ProcessedWebhook) {
        if !processed.should_decrease_stock() {
            return;
        }
        if let WebhookOutcome::Applied { order_id, .. } = processed.outcome {
            self.decrease_stock(order_id).await;
        }
    }

    pub async fn get_payment_status(
        &self,
        provider_payment_id: &str,
    ) -> Result<PaymentStatusView, PipelineError> {
        let payment = self.find_payment(provider_payment_id).await?;
        if payment.provider == ProviderKind::Mock.as_str() {
            return Ok(payment.status_view());
        }
        let provider = self.providers.get(&payment.provider)?;
        provider.get_payment_status(provider_payment_id).await
    }

    /// Marks a mock payment paid as if its gateway had called back. Repeat
    /// calls on an already paid payment change nothing.
    #[tracing::instrument(name = "mock_complete", skip(self))]
    pub async fn complete_mock_payment(
        &self,
        provider_payment_id: &str,
    ) -> Result<MockCompletion, PipelineError> {
        let payment = self.find_payment(provider_payment_id).await?;
        if payment.provider != ProviderKind::Mock.as_str() {
            return Err(PipelineError::ProviderMismatch {
                payment_id: payment.provider_payment_id,
                expected: payment.provider,
                actual: ProviderKind::Mock.to_string(),
            });
        }

        let completion = MockCompletion {
            provider_payment_id: payment.provider_payment_id.clone(),
            order_id: payment.order_id,
        };
        if payment.status == PaymentStatus::Paid {
            tracing::info!("mock payment already paid");
            return Ok(completion);
        }

        self.store
            .force_status(provider_payment_id, &PaymentStatus::Paid)
            .await?;
        if let Err(e) = self
            .store
            .update_order_status(payment.order_id, PaymentStatus::Paid.order_status())
            .await
        {
            tracing::warn!(order_id = payment.order_id, error = %e, "failed to sync order status");
        }
        self.decrease_stock(payment.order_id).await;

        self.audit(NewAuditEntry::new(
            "payment",
            &payment.provider_payment_id,
            "mock_completed",
            "mock",
            serde_json::json!({ "old_status": payment.status.as_str() }),
        ))
        .await;
        self.notifier
            .enqueue(NotificationJob {
                order_id: payment.order_id,
                provider_payment_id: payment.provider_payment_id.clone(),
                amount: payment.money,
                status: PaymentStatus::Paid,
            })
            .await;

        tracing::info!(order_id = payment.order_id, "mock payment completed");
        Ok(completion)
    }

    async fn find_payment(&self, provider_payment_id: &str) -> Result<Payment, PipelineError> {
        self.store
            .get_by_provider_id(provider_payment_id)
            .await?
            .ok_or_else(|| PipelineError::PaymentNotFound(provider_payment_id.to_string()))
    }

    async fn decrease_stock(&self, order_id: i64) {
        match self.store.decrease_stock(order_id).await {
            Ok(()) => tracing::info!(order_id, "stock decreased"),
            Err(e) => tracing::warn!(order_id, error = %e, "failed to decrease stock"),
        }
    }

    async fn audit(&self, entry: NewAuditEntry) {
        if let Err(e) = self.store.record(&entry).await {
            tracing::error!(action = %entry.action, error = %e, "failed to write audit entry");
        }
    }
}
