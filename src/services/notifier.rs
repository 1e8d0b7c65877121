use {
    crate::{
        domain::{
            audit::NewAuditEntry,
            error::PipelineError,
            money::Money,
            notification::{Mailer, PaymentNotification},
            payment::PaymentStatus,
            store::Store,
        },
        metrics::Metrics,
    },
    std::{sync::Arc, time::Duration},
    tokio::sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
};

const ACTOR: &str = "notifier";

/// One "your payment changed" e-mail to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationJob {
    pub order_id: i64,
    pub provider_payment_id: String,
    pub amount: Money,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Sending half of the notification queue. Cloned into every request path.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationJob>,
    store: Arc<dyn Store>,
    metrics: Arc<Metrics>,
}

impl Notifier {
    pub fn channel(
        capacity: usize,
        store: Arc<dyn Store>,
        metrics: Arc<Metrics>,
    ) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, store, metrics }, rx)
    }

    /// Never waits for queue space: a full or closed queue drops the job and
    /// leaves an audit row behind.
    pub async fn enqueue(&self, job: NotificationJob) {
        let (job, reason) = match self.tx.try_send(job) {
            Ok(()) => return,
            Err(TrySendError::Full(job)) => (job, "queue_full"),
            Err(TrySendError::Closed(job)) => (job, "queue_closed"),
        };

        record_dropped(&*self.store, &self.metrics, &job, reason).await;
    }
}

/// Drain the queue until shutdown, sending each job with retries. On shutdown
/// the job in flight is audited as failed and everything still queued as
/// dropped.
pub async fn run_notifier(
    mut rx: mpsc::Receiver<NotificationJob>,
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    metrics: Arc<Metrics>,
    policy: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("notifier started");

    loop {
        let job = tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("notifier shutting down");
                drain_on_shutdown(&mut rx, &*store, &metrics).await;
                return;
            }
            job = rx.recv() => match job {
                Some(job) => job,
                None => {
                    tracing::info!("notification queue closed, notifier exiting");
                    return;
                }
            },
        };

        let Some(notification) = (match resolve(&*store, &job).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(order_id = job.order_id, error = %e, "cannot resolve notification recipient");
                None
            }
        }) else {
            continue;
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match mailer.send_payment_notification(&notification).await {
                Ok(()) => {
                    metrics.notification_sent();
                    tracing::info!(
                        payment_id = %job.provider_payment_id,
                        order_id = job.order_id,
                        attempt,
                        "payment notification sent"
                    );
                    break;
                }
                Err(e) if attempt >= policy.max_attempts => {
                    tracing::error!(
                        payment_id = %job.provider_payment_id,
                        attempts = attempt,
                        error = %e,
                        "payment notification failed"
                    );
                    record_failure(&*store, &metrics, &job, attempt, "retries_exhausted", &e).await;
                    break;
                }
                Err(e) => {
                    let delay = policy.delay(attempt);
                    tracing::warn!(
                        payment_id = %job.provider_payment_id,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "payment notification failed, retrying"
                    );
                    tokio::select! {
                        _ = shutdown.changed() => {
                            tracing::info!("notifier shutting down mid-retry");
                            record_failure(&*store, &metrics, &job, attempt, "shutdown", &e).await;
                            drain_on_shutdown(&mut rx, &*store, &metrics).await;
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Order → user → e-mail. Orders without a user get no notification.
async fn resolve(
    store: &dyn Store,
    job: &NotificationJob,
) -> Result<Option<PaymentNotification>, PipelineError> {
    let order = store
        .get_order(job.order_id)
        .await?
        .ok_or(PipelineError::OrderNotFound(job.order_id))?;
    let Some(user_id) = order.user_id else {
        return Ok(None);
    };
    let Some(user) = store.get_user(user_id).await? else {
        tracing::warn!(user_id, order_id = job.order_id, "order owner not found");
        return Ok(None);
    };

    Ok(Some(PaymentNotification {
        to: user.email,
        order_id: job.order_id,
        provider_payment_id: job.provider_payment_id.clone(),
        amount: job.amount,
        status: job.status.clone(),
    }))
}

async fn record_failure(
    store: &dyn Store,
    metrics: &Metrics,
    job: &NotificationJob,
    attempts: u32,
    reason: &str,
    err: &PipelineError,
) {
    let entry = NewAuditEntry::new(
        "payment",
        &job.provider_payment_id,
        "notification_failed",
        ACTOR,
        serde_json::json!({
            "order_id": job.order_id,
            "attempts": attempts,
            "reason": reason,
            "error": err.to_string(),
        }),
    );
    if let Err(e) = store.record(&entry).await {
        tracing::error!(error = %e, "failed to audit notification failure");
    }
    // Counted only once the audit row exists.
    metrics.notification_failed();
}

async fn record_dropped(store: &dyn Store, metrics: &Metrics, job: &NotificationJob, reason: &str) {
    tracing::warn!(
        payment_id = %job.provider_payment_id,
        order_id = job.order_id,
        reason,
        "notification dropped"
    );
    let entry = NewAuditEntry::new(
        "payment",
        &job.provider_payment_id,
        "notification_dropped",
        ACTOR,
        serde_json::json!({ "order_id": job.order_id, "reason": reason }),
    );
    if let Err(e) = store.record(&entry).await {
        tracing::error!(error = %e, "failed to audit dropped notification");
    }
    metrics.notification_dropped();
}

/// Stops intake and accounts for every job still buffered.
async fn drain_on_shutdown(
    rx: &mut mpsc::Receiver<NotificationJob>,
    store: &dyn Store,
    metrics: &Metrics,
) {
    rx.close();
    let mut dropped = 0usize;
    while let Ok(job) = rx.try_recv() {
        record_dropped(store, metrics, &job, "shutdown").await;
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(dropped, "queued notifications dropped on shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(4), Duration::from_secs(10));
        assert_eq!(policy.delay(40), Duration::from_secs(10));
    }
}
