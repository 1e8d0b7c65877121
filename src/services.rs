pub mod notifier;
pub mod payment_orchestrator;
