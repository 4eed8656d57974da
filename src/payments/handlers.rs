// HTTP handlers for the payment handshake

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use validator::Validate;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::orders::{ConfirmPaymentRequest, OrderError, OrderResponse};
use crate::payments::{PaymentDetails, WebhookAck};
use crate::AppState;

/// Header carrying the webhook body signature
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Handler for POST /api/payments/confirm
/// Verifies the checkout signature and confirms the order
#[utoipa::path(
    post,
    path = "/api/payments/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Payment confirmed (or already confirmed)", body = OrderResponse),
        (status = 400, description = "Signature verification failed; the attempt is recorded"),
        (status = 404, description = "No order for this gateway order id"),
        (status = 409, description = "Order can no longer be fulfilled; payment refunded")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let order = state
        .order_service
        .confirm_payment(
            &user,
            &request.gateway_order_id,
            &request.gateway_payment_id,
            &request.gateway_signature,
        )
        .await?;

    Ok(Json(order.into()))
}

/// Handler for POST /api/payments/webhook
/// The raw body is needed for the signature check
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Invalid signature or payload")
    ),
    tag = "payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, OrderError> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(OrderError::SignatureInvalid)?;

    let ack = state.order_service.handle_webhook(&body, signature).await?;

    Ok(Json(ack))
}

/// Handler for GET /api/admin/payments/{payment_id}
#[utoipa::path(
    get,
    path = "/api/admin/payments/{payment_id}",
    params(("payment_id" = String, Path, description = "Gateway payment ID")),
    responses(
        (status = 200, description = "Payment as seen by the gateway", body = PaymentDetails),
        (status = 502, description = "Payment gateway error")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentDetails>, OrderError> {
    let details = state.order_service.fetch_payment(&payment_id).await?;

    Ok(Json(details))
}
