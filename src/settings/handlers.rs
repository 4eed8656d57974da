// HTTP handlers for named settings (admin only)

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::settings::store::validate_setting;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingBody {
    #[schema(value_type = Object)]
    pub value: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingResponse {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: Value,
}

/// Handler for GET /api/admin/settings/{key}
#[utoipa::path(
    get,
    path = "/api/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key, e.g. delivery.default_charge")),
    responses(
        (status = 200, description = "Current value", body = SettingResponse),
        (status = 404, description = "Setting not found")
    ),
    security(("bearer_auth" = [])),
    tag = "settings"
)]
pub async fn get_setting(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(key): Path<String>,
) -> Result<Json<SettingResponse>, ApiError> {
    let value = state.settings.get(&key).await?.ok_or_else(|| ApiError::NotFound {
        resource: "Setting".to_string(),
        id: key.clone(),
    })?;

    Ok(Json(SettingResponse { key, value }))
}

/// Handler for PUT /api/admin/settings/{key}
#[utoipa::path(
    put,
    path = "/api/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    request_body = SettingBody,
    responses(
        (status = 200, description = "Value stored", body = SettingResponse),
        (status = 400, description = "Invalid key or value")
    ),
    security(("bearer_auth" = [])),
    tag = "settings"
)]
pub async fn put_setting(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> Result<Json<SettingResponse>, ApiError> {
    validate_setting(&key, &body.value).map_err(ApiError::BadRequest)?;

    state.settings.set(&key, body.value.clone()).await?;
    info!("Setting {} updated by admin {}", key, admin.user_id);

    Ok(Json(SettingResponse { key, value: body.value }))
}
