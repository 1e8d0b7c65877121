//! Process-wide payment counters, rendered in the Prometheus text format.

use std::{
    fmt::Write,
    sync::atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
pub struct Metrics {
    payments_created: AtomicU64,
    payment_create_failures: AtomicU64,
    webhooks_applied: AtomicU64,
    webhooks_duplicate: AtomicU64,
    webhooks_rejected: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    notifications_dropped: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(payment_created, payments_created, payments_created);
    counter!(payment_create_failed, payment_create_failures, payment_create_failures);
    counter!(webhook_applied, webhooks_applied, webhooks_applied);
    counter!(webhook_duplicate, webhooks_duplicate, webhooks_duplicate);
    counter!(webhook_rejected, webhooks_rejected, webhooks_rejected);
    counter!(notification_sent, notifications_sent, notifications_sent);
    counter!(notification_failed, notifications_failed, notifications_failed);
    counter!(notification_dropped, notifications_dropped, notifications_dropped);

    pub fn export_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 8] = [
            (
                "payments_created_total",
                "Payments created at a provider",
                self.payments_created(),
            ),
            (
                "payment_create_failures_total",
                "Payment creations that failed",
                self.payment_create_failures(),
            ),
            (
                "webhooks_applied_total",
                "Webhook events that changed payment state",
                self.webhooks_applied(),
            ),
            (
                "webhooks_duplicate_total",
                "Webhook events skipped as already processed",
                self.webhooks_duplicate(),
            ),
            (
                "webhooks_rejected_total",
                "Webhook deliveries rejected before any state change",
                self.webhooks_rejected(),
            ),
            (
                "notifications_sent_total",
                "Payment notifications delivered to the mailer",
                self.notifications_sent(),
            ),
            (
                "notifications_failed_total",
                "Payment notifications that exhausted their retries",
                self.notifications_failed(),
            ),
            (
                "notifications_dropped_total",
                "Payment notifications dropped on a full queue",
                self.notifications_dropped(),
            ),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}
