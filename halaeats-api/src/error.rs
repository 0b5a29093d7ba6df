use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use halaeats_catalog::CatalogError;
use halaeats_core::CoreError;
use halaeats_order::{CheckoutError, OrderError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::Unavailable(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::Validation(msg),
            CoreError::NotFound(msg) => AppError::NotFound(msg),
            CoreError::Conflict(msg) => AppError::Conflict(msg),
            CoreError::Unavailable(msg) => AppError::Unavailable(msg),
            CoreError::InternalError(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        let message = err.to_string();
        match err {
            CheckoutError::SessionNotFound(_)
            | CheckoutError::UnknownAddress(_)
            | CheckoutError::UnknownSlot(_)
            | CheckoutError::UnknownPaymentMethod(_) => AppError::NotFound(message),
            CheckoutError::SessionClosed(_)
            | CheckoutError::SlotUnavailable(_)
            | CheckoutError::Pending(_)
            | CheckoutError::NotAtReview
            | CheckoutError::QuoteExpired => AppError::Conflict(message),
            CheckoutError::Incomplete(_) | CheckoutError::InvalidCart(_) => {
                AppError::Validation(message)
            }
            CheckoutError::PaymentDeclined => AppError::PaymentRequired(message),
            CheckoutError::Service(core) => core.into(),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::DishNotFound(_) | CatalogError::SlotNotFound(_) => AppError::NotFound(message),
            CatalogError::InvalidDish(_) | CatalogError::InvalidSlot(_) => AppError::Validation(message),
            CatalogError::Storage(_) => AppError::Internal(anyhow::anyhow!(message)),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::NotFound(_) => AppError::NotFound(message),
            OrderError::InvalidTransition { .. } => AppError::Conflict(message),
            OrderError::Storage(core) => core.into(),
        }
    }
}
