use std::sync::Arc;

use storefront_api::{
    auth::TokenService,
    catalog::{PgCatalogStore, PgDeliveryChargeStore},
    config::AppConfig,
    coupons::PgCouponStore,
    create_router, db,
    orders::{OrderService, PgOrderStore},
    payments::HttpPaymentGateway,
    reaper,
    settings::PgSettingsStore,
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Storefront API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.max_connections)
        .await
        .expect("Failed to create database pool");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let gateway = HttpPaymentGateway::new(config.gateway.clone()).expect("Failed to build payment gateway client");
    let catalog = Arc::new(PgCatalogStore::new(db_pool.clone()));
    let coupons = Arc::new(PgCouponStore::new(db_pool.clone()));
    let settings = Arc::new(PgSettingsStore::new(db_pool.clone()));

    let order_service = Arc::new(OrderService::new(
        Arc::new(PgOrderStore::new(db_pool.clone())),
        catalog.clone(),
        Arc::new(PgDeliveryChargeStore::new(db_pool.clone())),
        coupons.clone(),
        settings.clone(),
        Arc::new(gateway),
    ));

    reaper::spawn(order_service.clone(), config.reaper);

    let state = AppState {
        order_service,
        catalog,
        coupons,
        settings,
        tokens: Arc::new(TokenService::new(config.jwt_secret.clone())),
    };
    let app = create_router(state);

    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Storefront API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}
