pub mod auth;
pub mod catalog;
pub mod config;
pub mod coupons;
pub mod db;
pub mod error;
pub mod orders;
pub mod payments;
pub mod reaper;
pub mod settings;
pub mod validation;

#[cfg(test)]
mod memory;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use auth::TokenService;
use catalog::CatalogStore;
use coupons::CouponStore;
use orders::OrderService;
use settings::SettingsStore;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        orders::handlers::create_order_handler,
        orders::handlers::get_order_history_handler,
        orders::handlers::get_order_by_id_handler,
        orders::handlers::cancel_order_handler,
        orders::handlers::update_order_status_handler,
        payments::handlers::confirm_payment,
        payments::handlers::payment_webhook,
        payments::handlers::get_payment,
        coupons::handlers::apply_coupon,
        coupons::handlers::list_coupons,
        coupons::handlers::create_coupon,
        settings::handlers::get_setting,
        settings::handlers::put_setting,
        catalog::handlers::get_breadcrumb,
        catalog::handlers::set_variant_stock,
    ),
    components(
        schemas(
            orders::OrderStatus,
            orders::PaymentStatus,
            orders::PaymentMethod,
            orders::OrderItemRequest,
            orders::ShippingAddress,
            orders::CreateOrderRequest,
            orders::ApplyCouponRequest,
            orders::ConfirmPaymentRequest,
            orders::CancelOrderRequest,
            orders::UpdateStatusRequest,
            orders::OrderLine,
            orders::AppliedCoupon,
            orders::OrderCalculation,
            orders::PaymentInfo,
            orders::StatusTimestamps,
            orders::OrderResponse,
            orders::CreateOrderResponse,
            payments::PaymentIntent,
            payments::PaymentDetails,
            payments::Refund,
            payments::WebhookAck,
            coupons::CouponType,
            coupons::models::CreateCouponRequest,
            coupons::models::CouponResponse,
            settings::handlers::SettingBody,
            settings::handlers::SettingResponse,
            catalog::Crumb,
            catalog::handlers::SetStockRequest,
            catalog::handlers::StockResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "orders", description = "Order creation, history, cancellation and fulfilment"),
        (name = "payments", description = "Payment confirmation and gateway webhooks"),
        (name = "coupons", description = "Coupon preview and administration"),
        (name = "settings", description = "Named store settings"),
        (name = "catalog", description = "Category breadcrumbs and variant stock")
    ),
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = "Order pricing, coupons and payment confirmation for the storefront",
        contact(
            name = "API Support",
            email = "support@storefront.example"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<OrderService>,
    pub catalog: Arc<dyn CatalogStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub tokens: Arc<TokenService>,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Orders
        .route(
            "/api/orders",
            post(orders::handlers::create_order_handler).get(orders::handlers::get_order_history_handler),
        )
        .route("/api/orders/:id", get(orders::handlers::get_order_by_id_handler))
        .route("/api/orders/:id/cancel", post(orders::handlers::cancel_order_handler))
        .route(
            "/api/admin/orders/:id/status",
            patch(orders::handlers::update_order_status_handler),
        )
        // Payments
        .route("/api/payments/confirm", post(payments::handlers::confirm_payment))
        .route("/api/payments/webhook", post(payments::handlers::payment_webhook))
        .route("/api/admin/payments/:payment_id", get(payments::handlers::get_payment))
        // Coupons
        .route("/api/coupons/apply", post(coupons::handlers::apply_coupon))
        .route("/api/coupons", get(coupons::handlers::list_coupons))
        .route("/api/admin/coupons", post(coupons::handlers::create_coupon))
        // Settings and catalog
        .route(
            "/api/admin/settings/:key",
            get(settings::handlers::get_setting).put(settings::handlers::put_setting),
        )
        .route("/api/categories/:id/breadcrumb", get(catalog::handlers::get_breadcrumb))
        .route("/api/admin/products/:id/stock", put(catalog::handlers::set_variant_stock))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}
