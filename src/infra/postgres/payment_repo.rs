use {
    crate::domain::{
        error::PipelineError,
        id::EventId,
        money::{Currency, Money, MoneyAmount},
        payment::{NewPayment, Payment, PaymentStatus, WebhookApply},
    },
    chrono::{DateTime, Utc},
    sqlx::{PgConnection, PgPool},
};

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    provider_payment_id: String,
    order_id: i64,
    amount_cents: i64,
    currency: String,
    status: String,
    provider: String,
    checkout_url: String,
    webhook_event_id: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PipelineError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            provider_payment_id: row.provider_payment_id,
            order_id: row.order_id,
            money: Money::new(
                MoneyAmount::new(row.amount_cents)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            status: PaymentStatus::from(row.status),
            provider: row.provider,
            checkout_url: row.checkout_url,
            webhook_event_id: row.webhook_event_id,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_payment(pool: &PgPool, payment: &NewPayment) -> Result<Payment, PipelineError> {
    let row: PaymentRow = sqlx::query_as(
        r#"
        INSERT INTO payments
            (provider_payment_id, order_id, amount_cents, currency, status,
             provider, checkout_url, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, provider_payment_id, order_id, amount_cents, currency, status, provider,
                  checkout_url, webhook_event_id, metadata, created_at, updated_at
        "#,
    )
    .bind(payment.provider_payment_id())
    .bind(payment.order_id())
    .bind(payment.money().amount().minor_units())
    .bind(payment.money().currency().as_str())
    .bind(payment.status().as_str())
    .bind(payment.provider().as_str())
    .bind(payment.checkout_url())
    .bind(payment.metadata())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get_by_provider_id(
    pool: &PgPool,
    provider_payment_id: &str,
) -> Result<Option<Payment>, PipelineError> {
    let mut conn = pool.acquire().await?;
    select_by_provider_id(&mut conn, provider_payment_id).await
}

async fn select_by_provider_id(
    conn: &mut PgConnection,
    provider_payment_id: &str,
) -> Result<Option<Payment>, PipelineError> {
    let row: Option<PaymentRow> = sqlx::query_as(
        r#"
        SELECT id, provider_payment_id, order_id, amount_cents, currency, status, provider,
               checkout_url, webhook_event_id, metadata, created_at, updated_at
        FROM payments
        WHERE provider_payment_id = $1
        "#,
    )
    .bind(provider_payment_id)
    .fetch_optional(conn)
    .await?;

    row.map(Payment::try_from).transpose()
}

/// The payment a webhook event was applied to, if the event was ever applied.
pub async fn get_by_webhook_event_id(
    pool: &PgPool,
    event_id: &EventId,
) -> Result<Option<Payment>, PipelineError> {
    let row: Option<PaymentRow> = sqlx::query_as(
        r#"
        SELECT p.id, p.provider_payment_id, p.order_id, p.amount_cents, p.currency, p.status,
               p.provider, p.checkout_url, p.webhook_event_id, p.metadata,
               p.created_at, p.updated_at
        FROM webhook_events w
        JOIN payments p ON p.provider_payment_id = w.provider_payment_id
        WHERE w.event_id = $1
        "#,
    )
    .bind(event_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(Payment::try_from).transpose()
}

/// Record the event and write the new status in one transaction.
pub async fn apply_webhook(
    pool: &PgPool,
    provider_payment_id: &str,
    status: &PaymentStatus,
    event_id: Option<&EventId>,
) -> Result<WebhookApply, PipelineError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut *tx)
        .await?;

    // Serialize all deliveries for this payment.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(provider_payment_id)
        .execute(&mut *tx)
        .await?;

    let Some(before) = select_by_provider_id(&mut tx, provider_payment_id).await? else {
        return Err(PipelineError::PaymentNotFound(provider_payment_id.to_string()));
    };

    if let Some(event_id) = event_id {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO webhook_events (event_id, provider_payment_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING true
            "#,
        )
        .bind(event_id.as_str())
        .bind(provider_payment_id)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.commit().await?;
            return Ok(WebhookApply::Duplicate);
        }
    }

    let updated = sqlx::query(
        r#"
        UPDATE payments
        SET status = $1, webhook_event_id = COALESCE($2, webhook_event_id), updated_at = now()
        WHERE id = $3
        "#,
    )
    .bind(status.as_str())
    .bind(event_id.map(EventId::as_str))
    .bind(before.id)
    .execute(&mut *tx)
    .await;

    match updated {
        Ok(_) => {}
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Ok(WebhookApply::Duplicate);
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;
    Ok(WebhookApply::Applied(before))
}

pub async fn force_status(
    pool: &PgPool,
    provider_payment_id: &str,
    status: &PaymentStatus,
) -> Result<(), PipelineError> {
    let result = sqlx::query(
        "UPDATE payments SET status = $1, updated_at = now() WHERE provider_payment_id = $2",
    )
    .bind(status.as_str())
    .bind(provider_payment_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PipelineError::PaymentNotFound(provider_payment_id.to_string()));
    }
    Ok(())
}

pub async fn list_for_order(pool: &PgPool, order_id: i64) -> Result<Vec<Payment>, PipelineError> {
    let rows: Vec<PaymentRow> = sqlx::query_as(
        r#"
        SELECT id, provider_payment_id, order_id, amount_cents, currency, status, provider,
               checkout_url, webhook_event_id, metadata, created_at, updated_at
        FROM payments
        WHERE order_id = $1
        ORDER BY id DESC
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Payment::try_from).collect()
}
