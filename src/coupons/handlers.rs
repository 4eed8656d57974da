// HTTP handlers for coupon endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use tracing::info;
use validator::Validate;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::coupons::models::{CouponResponse, CreateCouponRequest};
use crate::error::ApiError;
use crate::orders::{ApplyCouponRequest, OrderCalculation, OrderError};
use crate::AppState;

/// Handler for POST /api/coupons/apply
/// Prices the cart with the coupon; nothing is reserved or counted
#[utoipa::path(
    post,
    path = "/api/coupons/apply",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Price breakdown with the coupon applied", body = OrderCalculation),
        (status = 400, description = "Invalid cart or coupon not applicable")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ApplyCouponRequest>,
) -> Result<Json<OrderCalculation>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let calculation = state.order_service.preview(&user, &request).await?;

    Ok(Json(calculation))
}

/// Handler for GET /api/coupons
/// Active, public coupons valid right now
#[utoipa::path(
    get,
    path = "/api/coupons",
    responses(
        (status = 200, description = "Currently valid public coupons", body = [CouponResponse])
    ),
    tag = "coupons"
)]
pub async fn list_coupons(State(state): State<AppState>) -> Result<Json<Vec<CouponResponse>>, ApiError> {
    let coupons = state.coupons.list_public(Utc::now()).await?;

    Ok(Json(coupons.iter().map(CouponResponse::from).collect()))
}

/// Handler for POST /api/admin/coupons
#[utoipa::path(
    post,
    path = "/api/admin/coupons",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created", body = CouponResponse),
        (status = 400, description = "Invalid coupon definition"),
        (status = 409, description = "Coupon code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<CouponResponse>), ApiError> {
    request.validate()?;
    let coupon = request.into_coupon().map_err(ApiError::BadRequest)?;

    state.coupons.create(&coupon).await?;
    info!("Coupon {} created by admin {}", coupon.code, admin.user_id);

    Ok((StatusCode::CREATED, Json(CouponResponse::from(&coupon))))
}
