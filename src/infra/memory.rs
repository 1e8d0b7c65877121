//! In-process store for tests and for running without a database.

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
    chrono::Utc,
    std::collections::{BTreeMap, HashMap},
    tokio::sync::Mutex,
};

#[derive(Default)]
struct State {
    last_order_id: i64,
    last_payment_id: i64,
    last_user_id: i64,
    orders: BTreeMap<i64, Order>,
    payments: HashMap<String, Payment>,
    /// event ID → provider payment ID
    webhook_events: HashMap<String, String>,
    stock: HashMap<i64, i64>,
    users: HashMap<i64, User>,
    audit: Vec<NewAuditEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, email: &str) -> User {
        let mut state = self.state.lock().await;
        state.last_user_id += 1;
        let user = User {
            id: state.last_user_id,
            email: email.to_string(),
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub async fn set_stock(&self, product_id: i64, quantity: i64) {
        self.state.lock().await.stock.insert(product_id, quantity);
    }

    pub async fn stock(&self, product_id: i64) -> Option<i64> {
        self.state.lock().await.stock.get(&product_id).copied()
    }

    pub async fn audit_entries(&self) -> Vec<NewAuditEntry> {
        self.state.lock().await.audit.clone()
    }

    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, PipelineError> {
        let mut state = self.state.lock().await;
        state.last_order_id += 1;
        let created = Order {
            id: state.last_order_id,
            user_id: order.user_id(),
            items: order.items().to_vec(),
            money: *order.money(),
            status: order.status(),
            payment_id: None,
            shipping_address: order.shipping_address().clone(),
            created_at: Utc::now(),
        };
        state.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, PipelineError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(PipelineError::OrderNotFound(id))?;
        order.status = status;
        Ok(())
    }

    async fn update_order_payment_id(
        &self,
        id: i64,
        provider_payment_id: &str,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(PipelineError::OrderNotFound(id))?;
        order.payment_id = Some(provider_payment_id.to_string());
        Ok(())
    }

    async fn decrease_stock(&self, order_id: i64) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        let items = state
            .orders
            .get(&order_id)
            .ok_or(PipelineError::OrderNotFound(order_id))?
            .items
            .clone();
        for item in items {
            if let Some(quantity) = state.stock.get_mut(&item.product_id) {
                *quantity = (*quantity - item.quantity).max(0);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, PipelineError> {
        let mut state = self.state.lock().await;
        if !state.orders.contains_key(&payment.order_id()) {
            return Err(PipelineError::OrderNotFound(payment.order_id()));
        }
        if state.payments.contains_key(payment.provider_payment_id()) {
            return Err(PipelineError::Validation(format!(
                "payment {} already exists",
                payment.provider_payment_id()
            )));
        }

        state.last_payment_id += 1;
        let now = Utc::now();
        let created = Payment {
            id: state.last_payment_id,
            provider_payment_id: payment.provider_payment_id().to_string(),
            order_id: payment.order_id(),
            money: *payment.money(),
            status: payment.status(),
            provider: payment.provider().as_str().to_string(),
            checkout_url: payment.checkout_url().to_string(),
            webhook_event_id: None,
            metadata: payment.metadata().clone(),
            created_at: now,
            updated_at: now,
        };
        state
            .payments
            .insert(created.provider_payment_id.clone(), created.clone());
        Ok(created)
    }

    async fn get_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, PipelineError> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .get(provider_payment_id)
            .cloned())
    }

    async fn get_by_webhook_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<Payment>, PipelineError> {
        let state = self.state.lock().await;
        Ok(state
            .webhook_events
            .get(event_id.as_str())
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn apply_webhook(
        &self,
        provider_payment_id: &str,
        status: &PaymentStatus,
        event_id: Option<&EventId>,
    ) -> Result<WebhookApply, PipelineError> {
        let mut state = self.state.lock().await;
        let Some(before) = state.payments.get(provider_payment_id).cloned() else {
            return Err(PipelineError::PaymentNotFound(
                provider_payment_id.to_string(),
            ));
        };

        if let Some(event_id) = event_id {
            if state.webhook_events.contains_key(event_id.as_str()) {
                return Ok(WebhookApply::Duplicate);
            }
            state
                .webhook_events
                .insert(event_id.to_string(), provider_payment_id.to_string());
        }

        if let Some(payment) = state.payments.get_mut(provider_payment_id) {
            payment.status = status.clone();
            if let Some(event_id) = event_id {
                payment.webhook_event_id = Some(event_id.to_string());
            }
            payment.updated_at = Utc::now();
        }
        Ok(WebhookApply::Applied(before))
    }

    async fn force_status(
        &self,
        provider_payment_id: &str,
        status: &PaymentStatus,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .get_mut(provider_payment_id)
            .ok_or_else(|| PipelineError::PaymentNotFound(provider_payment_id.to_string()))?;
        payment.status = status.clone();
        payment.updated_at = Utc::now();
        Ok(())
    }

    async fn list_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PipelineError> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(payments)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, PipelineError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn record(&self, entry: &NewAuditEntry) -> Result<(), PipelineError> {
        self.state.lock().await.audit.push(entry.clone());
        Ok(())
    }
}
