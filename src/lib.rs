pub mod auth;
pub mod config;
pub mod db;
pub mod validation;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use auth::{
    handlers, AuthResponse, AuthService, LoginRequest, PasswordService, PasswordVerifier,
    RefreshRequest, Role, SignUpRequest, StoreAuthenticator, TokenCodec, TokenError, UserInfo,
    UserStore,
};
use config::TokenConfig;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::signup_handler,
        handlers::login_handler,
        handlers::refresh_handler,
        handlers::me_handler,
    ),
    components(
        schemas(SignUpRequest, LoginRequest, RefreshRequest, AuthResponse, UserInfo, Role)
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication management endpoints")
    ),
    info(
        title = "Auth API",
        version = "0.1.0",
        description = "Signup, login and token refresh with signed bearer tokens"
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

/// Wire the auth service over a user store.
///
/// Fails if the token configuration is unusable, so call it once at startup.
pub fn build_auth_service(
    token_config: &TokenConfig,
    store: Arc<dyn UserStore>,
) -> Result<AuthService, TokenError> {
    let codec = Arc::new(TokenCodec::new(token_config)?);
    let passwords: Arc<dyn PasswordVerifier> = Arc::new(PasswordService::new());
    let authenticator = Arc::new(StoreAuthenticator::new(store.clone(), passwords.clone()));

    Ok(AuthService::new(store, passwords, authenticator, codec))
}

/// Creates and configures the application router
pub fn create_router(service: Arc<AuthService>) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::me_handler))
        .route_layer(middleware::from_fn_with_state(
            service.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/auth/signup", post(handlers::signup_handler))
        .route("/api/auth/login", post(handlers::login_handler))
        .route("/api/auth/refresh", post(handlers::refresh_handler))
        .merge(protected)
        .layer(cors)
        .with_state(service)
}
