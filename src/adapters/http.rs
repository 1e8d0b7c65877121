use {
    super::api_errors::ApiError,
    crate::{
        AppState,
        domain::{
            error::PipelineError,
            money::Currency,
            order::{NewOrder, Order, OrderItem},
            payment::PaymentStatusView,
        },
    },
    axum::{
        Json, Router,
        body::Bytes,
        extract::{DefaultBodyLimit, Path, State},
        http::{HeaderMap, StatusCode, header},
        response::IntoResponse,
        routing::{get, post},
    },
    serde::{Deserialize, Serialize},
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const CLOUDPAYMENTS_SIGNATURE_HEADER: &str = "Content-HMAC";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(35);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/advance", post(advance_order))
        .route("/payments/create", post(create_payment))
        .route("/payments/webhook", post(payment_webhook))
        .route("/webhooks/{provider}", post(provider_webhook))
        .route("/payments/status/{payment_id}", get(payment_status))
        .route("/payments/mock/complete", post(mock_complete))
        .layer(DefaultBodyLimit::max(64 * 1024)) // 64 KB, provider notifications are a few KB
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Orders ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub shipping_address: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub payments: Vec<PaymentStatusView>,
}

async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let currency = match req.currency.as_deref() {
        Some(raw) => Currency::try_from(raw)?,
        None => state.default_currency,
    };
    let new_order = NewOrder::new(req.user_id, req.items, currency, req.shipping_address)?;
    let order = state.store.create_order(&new_order).await?;
    tracing::info!(order_id = order.id, total = order.amount().minor_units(), "order created");
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>, ApiError> {
    let order = state
        .store
        .get_order(id)
        .await?
        .ok_or(PipelineError::OrderNotFound(id))?;
    let payments = state
        .store
        .list_for_order(id)
        .await?
        .iter()
        .map(|p| p.status_view())
        .collect();
    Ok(Json(OrderView { order, payments }))
}

/// Fulfilment step: `paid → shipped → delivered`.
async fn advance_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    let mut order = state
        .store
        .get_order(id)
        .await?
        .ok_or(PipelineError::OrderNotFound(id))?;
    let next = order.advance_fulfilment()?;
    state.store.update_order_status(id, next).await?;
    tracing::info!(order_id = id, status = %next, "order advanced");
    Ok(Json(order))
}

// ── Payments ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub payment_id: String,
    pub payment_url: String,
}

async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
    let created = state.orchestrator.create_payment(req.order_id).await?;
    Ok(Json(CreatePaymentResponse {
        payment_id: created.provider_payment_id,
        payment_url: created.checkout_url,
    }))
}

async fn payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentStatusView>, ApiError> {
    Ok(Json(
        state.orchestrator.get_payment_status(&payment_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct MockCompleteRequest {
    pub payment_id: String,
}

async fn mock_complete(
    State(state): State<AppState>,
    Json(req): Json<MockCompleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let done = state
        .orchestrator
        .complete_mock_payment(&req.payment_id)
        .await?;
    Ok(Json(serde_json::json!({
        "message": "Payment completed successfully",
        "payment_id": done.provider_payment_id,
        "order_id": done.order_id,
    })))
}

// ── Webhooks ───────────────────────────────────────────────────────────────

/// Notifications for the configured default provider.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    handle_webhook(&state, None, &headers, &body).await
}

async fn provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    handle_webhook(&state, Some(provider.as_str()), &headers, &body).await
}

async fn handle_webhook(
    state: &AppState,
    provider: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = [SIGNATURE_HEADER, CLOUDPAYMENTS_SIGNATURE_HEADER]
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .ok_or_else(|| {
            PipelineError::InvalidSignature(format!("missing {SIGNATURE_HEADER} header"))
        })?;

    let processed = state
        .orchestrator
        .process_webhook(provider, body, signature)
        .await?;
    state.orchestrator.release_stock(&processed).await;

    Ok(Json(serde_json::json!({"status": "success"})))
}

// ── Metrics ────────────────────────────────────────────────────────────────

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}
