// HTTP handlers for authentication endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::auth::{
    error::AuthError,
    middleware::CurrentPrincipal,
    models::{AuthRequest, AuthResponse, LoginRequest, RefreshRequest, SignUpRequest, UserInfo},
    service::AuthService,
};

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input data", body = AuthResponse),
        (status = 415, description = "Body is not JSON", body = AuthResponse),
        (status = 409, description = "Email already exists", body = AuthResponse)
    ),
    tag = "auth"
)]
pub async fn signup_handler(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let Json(request) = payload?;
    info!("Registration request received for email: {}", request.email);
    request.validate()?;

    let response = service.authenticate(AuthRequest::SignUp(request)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Authenticate with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input data", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = AuthResponse)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(request) = payload?;
    info!("Login request received for email: {}", request.email);
    request.validate()?;

    let response = service.authenticate(AuthRequest::Login(request)).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = AuthResponse),
        (status = 401, description = "Invalid refresh token", body = AuthResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(request) = payload?;
    info!("Token refresh request received");
    request.validate()?;

    let response = service.refresh_token(&request.refresh_token).await?;
    Ok(Json(response))
}

/// Current user information (protected endpoint)
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Authenticated user", body = UserInfo),
        (status = 401, description = "Missing, expired or invalid access token"),
        (status = 503, description = "User store unreachable")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(service): State<Arc<AuthService>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<UserInfo>, AuthError> {
    let info = service.current_user(&principal.email).await?;
    Ok(Json(info))
}
