pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod metrics;
pub mod services;

use {
    adapters::providers::ProviderRegistry,
    domain::{money::Currency, store::Store},
    metrics::Metrics,
    services::{
        notifier::{NotificationJob, Notifier},
        payment_orchestrator::PaymentOrchestrator,
    },
    std::sync::Arc,
    tokio::sync::mpsc,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub orchestrator: PaymentOrchestrator,
    pub metrics: Arc<Metrics>,
    pub default_currency: Currency,
}

impl AppState {
    /// Wires the orchestrator and its notification queue. The returned
    /// receiver belongs to `services::notifier::run_notifier`.
    pub fn new(
        store: Arc<dyn Store>,
        providers: ProviderRegistry,
        metrics: Arc<Metrics>,
        notify_queue_capacity: usize,
        default_currency: Currency,
    ) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (notifier, rx) =
            Notifier::channel(notify_queue_capacity, store.clone(), metrics.clone());
        let orchestrator =
            PaymentOrchestrator::new(store.clone(), providers, notifier, metrics.clone());
        (
            Self {
                store,
                orchestrator,
                metrics,
                default_currency,
            },
            rx,
        )
    }
}
