use crate::domain::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

// Newtype над доменной ошибкой, чтобы реализовать для нее трейт Axum
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::UnsupportedProvider(_)
            | PipelineError::InvalidSignature(_)
            | PipelineError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            PipelineError::PaymentNotFound(_) | PipelineError::OrderNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PipelineError::ProviderMismatch { .. } => StatusCode::CONFLICT,
            PipelineError::Provider(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Notification(_)
            | PipelineError::Database(_)
            | PipelineError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Вся логика HTTP-ответов живет в слое адаптеров
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match &self.0 {
            PipelineError::Validation(msg) => ("validation_error", msg.clone()),
            PipelineError::UnsupportedProvider(name) => (
                "unsupported_provider",
                format!("unsupported payment provider: {name}"),
            ),
            PipelineError::InvalidSignature(_) => (
                "webhook_error",
                "invalid webhook signature".to_string(),
            ),
            PipelineError::MalformedPayload(msg) => ("webhook_error", msg.clone()),
            PipelineError::PaymentNotFound(id) => {
                ("payment_not_found", format!("payment not found: {id}"))
            }
            PipelineError::OrderNotFound(id) => ("order_not_found", format!("order not found: {id}")),
            err @ PipelineError::ProviderMismatch { .. } => ("provider_mismatch", err.to_string()),
            PipelineError::Provider(msg) => {
                tracing::error!("payment provider error: {msg}");
                ("provider_error", "payment provider error".to_string())
            }
            PipelineError::Notification(msg) => {
                tracing::error!("notification error: {msg}");
                ("internal_error", "internal error".to_string())
            }
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                ("internal_error", "internal error".to_string())
            }
            PipelineError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                ("internal_error", "internal error".to_string())
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
