use std::sync::Arc;

use auth_api::{auth::PgUserStore, build_auth_service, config::AppConfig, create_router, db};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Auth API - Starting...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Signing key and lifetimes are checked here, once, before serving
    let service = match build_auth_service(&config.token, Arc::new(PgUserStore::new(db_pool))) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Token configuration rejected: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_router(service);

    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Auth API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}
