// HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::orders::{
    CancelOrderRequest, CreateOrderRequest, CreateOrderResponse, OrderError, OrderResponse, OrderStatus,
    UpdateStatusRequest,
};
use crate::AppState;

/// Query parameters for order history
#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderHistoryQuery {
    /// Optional status filter
    pub status: Option<OrderStatus>,
}

/// Handler for POST /api/orders
/// Creates a new order for the authenticated user
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created; gateway orders include the payment intent", body = CreateOrderResponse),
        (status = 400, description = "Invalid cart, address or coupon"),
        (status = 401, description = "Missing or invalid token"),
        (status = 502, description = "Payment gateway unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let response = state.order_service.create_order(&user, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for GET /api/orders
/// Retrieves order history for the authenticated user
#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderHistoryQuery),
    responses(
        (status = 200, description = "Orders, newest first", body = [OrderResponse]),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order_history_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OrderHistoryQuery>,
) -> Result<Json<Vec<OrderResponse>>, OrderError> {
    let orders = state.order_service.list_orders(&user, query.status).await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// Handler for GET /api/orders/{order_id}
#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order_by_id_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state.order_service.get_order(&user, order_id).await?;

    Ok(Json(order.into()))
}

/// Handler for POST /api/orders/{order_id}/cancel
/// Owner or admin; a paid order is refunded before it is cancelled
#[utoipa::path(
    post,
    path = "/api/orders/{order_id}/cancel",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body(content = CancelOrderRequest, description = "Optional cancellation reason"),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 403, description = "Order belongs to another user"),
        (status = 409, description = "Order can no longer be cancelled"),
        (status = 502, description = "Refund failed; order unchanged")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn cancel_order_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    request: Option<Json<CancelOrderRequest>>,
) -> Result<Json<OrderResponse>, OrderError> {
    let Json(request) = request.unwrap_or_default();
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let order = state.order_service.cancel_order(&user, order_id, request.reason).await?;

    Ok(Json(order.into()))
}

/// Handler for PATCH /api/admin/orders/{order_id}/status
/// Updates the status of an order (admin only)
#[utoipa::path(
    patch,
    path = "/api/admin/orders/{order_id}/status",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_order_status_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let target = request.status;
    let order = state.order_service.admin_update_status(order_id, request).await?;
    tracing::info!("Admin {} moved order {} to {}", admin.user_id, order.order_number, target);

    Ok(Json(order.into()))
}
