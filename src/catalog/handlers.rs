// HTTP handlers for catalog collaborators used by the order core

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::catalog::breadcrumb::breadcrumb;
use crate::catalog::models::{Category, Crumb};
use crate::error::ApiError;
use crate::AppState;

/// Request body for overwriting one variant's stock
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetStockRequest {
    #[validate(length(min = 1, max = 20, message = "Size must be between 1 and 20 characters"))]
    pub size: String,

    #[validate(length(min = 1, max = 40, message = "Color must be between 1 and 40 characters"))]
    pub color: String,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockResponse {
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub stock: i32,
    pub total_stock: i32,
}

/// Handler for GET /api/categories/{id}/breadcrumb
#[utoipa::path(
    get,
    path = "/api/categories/{id}/breadcrumb",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Breadcrumb trail, root first", body = [Crumb]),
        (status = 404, description = "Category not found")
    ),
    tag = "catalog"
)]
pub async fn get_breadcrumb(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Crumb>>, ApiError> {
    let category = state
        .catalog
        .find_category(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "Category".to_string(),
            id: id.to_string(),
        })?;

    let ancestors: HashMap<Uuid, Category> = state
        .catalog
        .find_categories(&category.path)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(Json(breadcrumb(&category, |ancestor| ancestors.get(&ancestor))))
}

/// Handler for PUT /api/admin/products/{id}/stock
#[utoipa::path(
    put,
    path = "/api/admin/products/{id}/stock",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = SetStockRequest,
    responses(
        (status = 200, description = "Variant stock updated", body = StockResponse),
        (status = 400, description = "Invalid input data"),
        (status = 404, description = "Product or variant not found")
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn set_variant_stock(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    request.validate()?;

    let not_found = || ApiError::NotFound {
        resource: "Product".to_string(),
        id: id.to_string(),
    };
    state.catalog.find_product(id).await?.ok_or_else(not_found)?;

    if !state
        .catalog
        .set_variant_stock(id, &request.size, &request.color, request.stock)
        .await?
    {
        return Err(ApiError::NotFound {
            resource: "Variant".to_string(),
            id: format!("{}/{}", request.size, request.color),
        });
    }
    tracing::info!(
        "Stock for product {} ({} / {}) set to {} by admin {}",
        id,
        request.size,
        request.color,
        request.stock,
        admin.user_id
    );

    let product = state.catalog.find_product(id).await?.ok_or_else(not_found)?;
    Ok(Json(StockResponse {
        product_id: product.id,
        stock: product.stock_for(&request.size, &request.color),
        size: request.size,
        color: request.color,
        total_stock: product.total_stock,
    }))
}
