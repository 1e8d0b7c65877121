//! PgStore against a real database at `postgres:password@localhost:5432`.
//! Run with `cargo test -- --ignored`.

mod common;

use common::*;
use gastro_pay::domain::audit::NewAuditEntry;
use gastro_pay::domain::error::PipelineError;
use gastro_pay::domain::id::EventId;
use gastro_pay::domain::money::Currency;
use gastro_pay::domain::order::{NewOrder, Order, OrderItem, OrderStatus};
use gastro_pay::domain::payment::{NewPayment, NewPaymentParams, PaymentStatus, WebhookApply};
use gastro_pay::domain::provider::ProviderKind;
use gastro_pay::domain::store::{AuditLog, OrderStore, PaymentStore, UserStore};
use gastro_pay::infra::postgres::PgStore;
use sqlx::PgPool;
use std::sync::Arc;

const DB: &str = "gastro_pay_test_store";

async fn store() -> PgStore {
    PgStore::new(setup_pool(DB).await)
}

async fn insert_product(pool: &PgPool, id: i64, quantity: i64) {
    sqlx::query(
        "INSERT INTO products (id, name, price_cents, quantity, in_stock) VALUES ($1, $2, 5000, $3, $3 > 0)",
    )
    .bind(id)
    .bind(format!("product {id}"))
    .bind(quantity)
    .execute(pool)
    .await
    .unwrap();
}

async fn product_quantity(pool: &PgPool, id: i64) -> (i64, bool) {
    sqlx::query_as("SELECT quantity, in_stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn order(store: &PgStore, product_id: i64, quantity: i64) -> Order {
    store
        .create_order(
            &NewOrder::new(
                None,
                vec![OrderItem {
                    product_id,
                    quantity,
                    price_cents: 5000,
                }],
                Currency::Rub,
                serde_json::json!({"city": "Kazan"}),
            )
            .unwrap(),
        )
        .await
        .unwrap()
}

async fn payment(store: &PgStore, order: &Order, provider_payment_id: &str) {
    store
        .create_payment(&NewPayment::new(NewPaymentParams {
            provider_payment_id: provider_payment_id.to_string(),
            order_id: order.id,
            money: order.money,
            provider: ProviderKind::Mock,
            checkout_url: format!("http://localhost:3001/mock-checkout/{provider_payment_id}"),
            metadata: serde_json::json!({ "order_id": order.id }),
        }))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a local postgres"]
async fn order_and_payment_round_trip() {
    let store = store().await;
    insert_product(store.pool(), 101, 10).await;
    let order = order(&store, 101, 2).await;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.amount().minor_units(), 10000);

    payment(&store, &order, "pg_rt_1").await;
    store.update_order_payment_id(order.id, "pg_rt_1").await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.payment_id.as_deref(), Some("pg_rt_1"));
    assert_eq!(loaded.items, order.items);

    let p = store.get_by_provider_id("pg_rt_1").await.unwrap().unwrap();
    assert_eq!(p.status, PaymentStatus::AwaitingPayment);
    assert_eq!(p.provider, "mock");
    assert_eq!(p.money.amount().minor_units(), 10000);
    assert_eq!(p.metadata["order_id"], order.id);
}

#[tokio::test]
#[ignore = "requires a local postgres"]
async fn apply_webhook_deduplicates_event_ids() {
    let store = store().await;
    insert_product(store.pool(), 102, 10).await;
    let order = order(&store, 102, 1).await;
    payment(&store, &order, "pg_dup_1").await;

    let event = EventId::new("pg_evt_dup").unwrap();
    let applied = store
        .apply_webhook("pg_dup_1", &PaymentStatus::Paid, Some(&event))
        .await
        .unwrap();
    let WebhookApply::Applied(before) = applied else {
        panic!("first delivery must apply");
    };
    assert_eq!(before.status, PaymentStatus::AwaitingPayment);

    let again = store
        .apply_webhook("pg_dup_1", &PaymentStatus::Canceled, Some(&event))
        .await
        .unwrap();
    assert_eq!(again, WebhookApply::Duplicate);

    let p = store.get_by_provider_id("pg_dup_1").await.unwrap().unwrap();
    assert_eq!(p.status, PaymentStatus::Paid);
    assert_eq!(p.webhook_event_id.as_deref(), Some("pg_evt_dup"));

    let by_event = store.get_by_webhook_event_id(&event).await.unwrap().unwrap();
    assert_eq!(by_event.provider_payment_id, "pg_dup_1");
}

#[tokio::test]
#[ignore = "requires a local postgres"]
async fn apply_webhook_unknown_payment() {
    let store = store().await;
    let event = EventId::new("pg_evt_missing").unwrap();
    let err = store
        .apply_webhook("pg_missing", &PaymentStatus::Paid, Some(&event))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::PaymentNotFound(_)));
    assert!(store.get_by_webhook_event_id(&event).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a local postgres"]
async fn concurrent_deliveries_apply_once() {
    let store = Arc::new(store().await);
    insert_product(store.pool(), 103, 10).await;
    let order = order(&store, 103, 1).await;
    payment(&store, &order, "pg_race_1").await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let event = EventId::new("pg_evt_race").unwrap();
            store
                .apply_webhook("pg_race_1", &PaymentStatus::Paid, Some(&event))
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if let WebhookApply::Applied(_) = handle.await.unwrap().unwrap() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
}

#[tokio::test]
#[ignore = "requires a local postgres"]
async fn decrease_stock_clamps_at_zero() {
    let store = store().await;
    insert_product(store.pool(), 104, 3).await;

    let first = order(&store, 104, 2).await;
    store.decrease_stock(first.id).await.unwrap();
    assert_eq!(product_quantity(store.pool(), 104).await, (1, true));

    let second = order(&store, 104, 5).await;
    store.decrease_stock(second.id).await.unwrap();
    assert_eq!(product_quantity(store.pool(), 104).await, (0, false));

    let err = store.decrease_stock(i64::MAX).await.unwrap_err();
    assert!(matches!(err, PipelineError::OrderNotFound(_)));
}

#[tokio::test]
#[ignore = "requires a local postgres"]
async fn list_for_order_is_newest_first() {
    let store = store().await;
    insert_product(store.pool(), 105, 10).await;
    let order = order(&store, 105, 1).await;
    payment(&store, &order, "pg_list_a").await;
    payment(&store, &order, "pg_list_b").await;

    let listed = store.list_for_order(order.id).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|p| p.provider_payment_id.as_str()).collect();
    assert_eq!(ids, vec!["pg_list_b", "pg_list_a"]);

    store.force_status("pg_list_a", &PaymentStatus::Canceled).await.unwrap();
    store.update_order_status(order.id, OrderStatus::Canceled).await.unwrap();
    assert_eq!(
        store.get_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Canceled
    );
    let err = store
        .force_status("pg_list_missing", &PaymentStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::PaymentNotFound(_)));
}

#[tokio::test]
#[ignore = "requires a local postgres"]
async fn users_and_audit() {
    let store = store().await;
    let id: i64 = sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind("pg-user@example.com")
        .fetch_one(store.pool())
        .await
        .unwrap();
    let user = store.get_user(id).await.unwrap().unwrap();
    assert_eq!(user.email, "pg-user@example.com");
    assert!(store.get_user(i64::MAX).await.unwrap().is_none());

    let entry = NewAuditEntry::new(
        "payment",
        "pg_audit_1",
        "status_changed",
        "webhook:mock",
        serde_json::json!({"new_status": "paid"}),
    );
    store.record(&entry).await.unwrap();
    let action: String =
        sqlx::query_scalar("SELECT action FROM audit_log WHERE entity_id = $1")
            .bind("pg_audit_1")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(action, "status_changed");
}
