use {
    crate::domain::{
        error::PipelineError,
        money::{Currency, Money, MoneyAmount},
        order::{NewOrder, Order, OrderItem, OrderStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::{PgPool, types::Json},
};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: Option<i64>,
    items: Json<Vec<OrderItem>>,
    total_cents: i64,
    currency: String,
    status: String,
    payment_id: Option<String>,
    shipping_address: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = PipelineError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            money: Money::new(
                MoneyAmount::new(row.total_cents)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            status: OrderStatus::try_from(row.status.as_str())?,
            payment_id: row.payment_id,
            shipping_address: row.shipping_address,
            created_at: row.created_at,
        })
    }
}

pub async fn insert_order(pool: &PgPool, order: &NewOrder) -> Result<Order, PipelineError> {
    let row: OrderRow = sqlx::query_as(
        r#"
        INSERT INTO orders (user_id, items, total_cents, currency, status, shipping_address)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, items, total_cents, currency, status, payment_id,
                  shipping_address, created_at
        "#,
    )
    .bind(order.user_id())
    .bind(Json(order.items()))
    .bind(order.money().amount().minor_units())
    .bind(order.money().currency().as_str())
    .bind(order.status().as_str())
    .bind(order.shipping_address())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get_order(pool: &PgPool, id: i64) -> Result<Option<Order>, PipelineError> {
    let row: Option<OrderRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, items, total_cents, currency, status, payment_id,
               shipping_address, created_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Order::try_from).transpose()
}

pub async fn update_status(pool: &PgPool, id: i64, status: OrderStatus) -> Result<(), PipelineError> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(PipelineError::OrderNotFound(id));
    }
    Ok(())
}

pub async fn update_payment_id(
    pool: &PgPool,
    id: i64,
    provider_payment_id: &str,
) -> Result<(), PipelineError> {
    let result =
        sqlx::query("UPDATE orders SET payment_id = $1, updated_at = now() WHERE id = $2")
            .bind(provider_payment_id)
            .bind(id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(PipelineError::OrderNotFound(id));
    }
    Ok(())
}

/// Subtract the order's line quantities from product stock, never below
/// zero. Lines for unknown products are ignored.
pub async fn decrease_stock(pool: &PgPool, order_id: i64) -> Result<(), PipelineError> {
    let mut tx = pool.begin().await?;

    let items: Option<Json<Vec<OrderItem>>> =
        sqlx::query_scalar("SELECT items FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(Json(items)) = items else {
        return Err(PipelineError::OrderNotFound(order_id));
    };

    for item in &items {
        sqlx::query(
            r#"
            UPDATE products
            SET quantity = GREATEST(quantity - $1, 0),
                in_stock = quantity - $1 > 0
            WHERE id = $2
            "#,
        )
        .bind(item.quantity)
        .bind(item.product_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
