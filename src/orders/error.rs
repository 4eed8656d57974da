use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::coupons::CouponRejection;
use crate::error::{ErrorResponse, StoreError};
use crate::payments::GatewayError;

/// Error types for order pricing, lifecycle and payment operations
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Bad input or a cart that cannot be priced
    #[error("{0}")]
    ValidationError(String),

    #[error("Invalid coupon: {0}")]
    Coupon(#[from] CouponRejection),

    #[error("Insufficient stock for {product} ({size} / {color}): requested {requested}, available {available}, short by {}", .requested - .available)]
    InsufficientStock {
        product: String,
        size: String,
        color: String,
        requested: i32,
        available: i32,
    },

    #[error("Order not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Payment signature verification failed")]
    SignatureInvalid,

    /// A conditional stock or coupon update lost to a concurrent order
    #[error("Could not reserve inventory: {0}")]
    ReservationFailed(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::Store(StoreError::Database(err))
    }
}

impl OrderError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderError::ValidationError(_)
            | OrderError::Coupon(_)
            | OrderError::InsufficientStock { .. }
            | OrderError::SignatureInvalid => StatusCode::BAD_REQUEST,
            OrderError::NotFound => StatusCode::NOT_FOUND,
            OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
            OrderError::InvalidTransition(_) | OrderError::ReservationFailed(_) => StatusCode::CONFLICT,
            OrderError::Gateway(GatewayError::InvalidAmount(_)) => StatusCode::BAD_REQUEST,
            OrderError::Gateway(_) => StatusCode::BAD_GATEWAY,
            OrderError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            OrderError::ValidationError(_) => "VALIDATION_ERROR",
            OrderError::Coupon(_) => "INVALID_COUPON",
            OrderError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            OrderError::NotFound => "NOT_FOUND",
            OrderError::Forbidden(_) => "FORBIDDEN",
            OrderError::InvalidTransition(_) => "INVALID_TRANSITION",
            OrderError::SignatureInvalid => "SIGNATURE_INVALID",
            OrderError::ReservationFailed(_) => "RESERVATION_FAILED",
            OrderError::Gateway(GatewayError::InvalidAmount(_)) => "INVALID_AMOUNT",
            OrderError::Gateway(_) => "GATEWAY_ERROR",
            OrderError::Store(StoreError::Conflict(_)) => "CONFLICT",
            OrderError::Store(_) => "DATABASE_ERROR",
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            OrderError::Store(StoreError::Conflict(msg)) => {
                warn!("Order conflict: {}", msg);
                msg.clone()
            }
            OrderError::Store(store_error) => {
                // Full detail stays in the logs
                error!("Order storage error: {:?}", store_error);
                "A database error occurred".to_string()
            }
            OrderError::Gateway(gateway_error) => {
                error!("Payment gateway error: {}", gateway_error);
                gateway_error.to_string()
            }
            OrderError::SignatureInvalid | OrderError::Forbidden(_) | OrderError::ReservationFailed(_) => {
                warn!("Order request rejected: {}", self);
                self.to_string()
            }
            other => {
                debug!("Order request rejected: {}", other);
                other.to_string()
            }
        };

        ErrorResponse::new(self.error_code(), message).into_response_with(status)
    }
}
