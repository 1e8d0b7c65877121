use {
    super::error::PipelineError,
    super::money::{Currency, Money, MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Canceled,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "canceled" => Ok(Self::Canceled),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            other => Err(PipelineError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    pub user_id: Option<i64>,
    pub items: Vec<OrderItem>,
    pub money: Money,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub shipping_address: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn amount(&self) -> MoneyAmount {
        self.money.amount()
    }

    /// Admin-driven fulfilment: `paid → shipped → delivered`. Webhooks never
    /// reach these states.
    pub fn advance_fulfilment(&mut self) -> Result<OrderStatus, PipelineError> {
        let next = match self.status {
            OrderStatus::Paid => OrderStatus::Shipped,
            OrderStatus::Shipped => OrderStatus::Delivered,
            other => {
                return Err(PipelineError::Validation(format!(
                    "order {} in status {other} cannot be fulfilled",
                    self.id
                )));
            }
        };
        self.status = next;
        Ok(next)
    }
}

/// For INSERT — total is fixed here and never recomputed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    user_id: Option<i64>,
    items: Vec<OrderItem>,
    money: Money,
    shipping_address: serde_json::Value,
}

impl NewOrder {
    pub fn new(
        user_id: Option<i64>,
        items: Vec<OrderItem>,
        currency: Currency,
        shipping_address: serde_json::Value,
    ) -> Result<Self, PipelineError> {
        if items.is_empty() {
            return Err(PipelineError::Validation("order has no items".into()));
        }

        let mut total = MoneyAmount::ZERO;
        for item in &items {
            if item.quantity <= 0 {
                return Err(PipelineError::Validation(format!(
                    "quantity must be positive for product {}",
                    item.product_id
                )));
            }
            let line = MoneyAmount::new(item.price_cents)?
                .checked_mul(item.quantity)
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| PipelineError::Validation("order total overflows".into()))?;
            total = line;
        }

        Ok(Self {
            user_id,
            items,
            money: Money::new(total, currency),
            shipping_address,
        })
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::Pending
    }

    pub fn shipping_address(&self) -> &serde_json::Value {
        &self.shipping_address
    }
}
