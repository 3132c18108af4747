// Bearer token filter for protected routes

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::auth::{models::Principal, service::AuthService, token::TokenKind};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was turned away by the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    ExpiredToken,
    InvalidToken,
    Unavailable,
}

impl AuthRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "Missing authentication token",
            AuthRejection::ExpiredToken => "Token expired",
            AuthRejection::InvalidToken => "Invalid token",
            AuthRejection::Unavailable => "Authentication service unavailable",
        }
    }

    /// 401 for anything the caller can fix by presenting another token
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthRejection::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.reason() }))).into_response()
    }
}

/// The principal a request was authenticated as.
///
/// Inserted into the request extensions by [`require_bearer`]; handlers take
/// it as an extractor.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentPrincipal>()
            .cloned()
            .ok_or(AuthRejection::MissingToken)
    }
}

/// Token from an `Authorization: Bearer <token>` header, if present and well-formed
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware that admits only requests carrying a valid access token.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn require_bearer(
    State(service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let endpoint = request.uri().path().to_string();
    let token = bearer_token(request.headers())
        .map(str::to_owned)
        .ok_or_else(|| {
            warn!("Missing bearer token in request to protected endpoint: {}", endpoint);
            AuthRejection::MissingToken
        })?;

    let classifier = service.classifier();
    let now = Utc::now();

    let claims = classifier.codec().parse(&token).map_err(|e| {
        warn!("Invalid token: {}", e);
        AuthRejection::InvalidToken
    })?;
    if claims.is_expired_at(now) {
        warn!("Expired token for user: {}", claims.sub);
        return Err(AuthRejection::ExpiredToken);
    }
    if claims.token_type != TokenKind::Access {
        warn!("Non-access token presented to {} by {}", endpoint, claims.sub);
        return Err(AuthRejection::InvalidToken);
    }

    let principal = match service.store().find_by_email(&claims.sub).await {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            warn!("Token subject no longer exists: {}", claims.sub);
            return Err(AuthRejection::InvalidToken);
        }
        Err(e) => {
            error!("Error loading principal {}: {}", claims.sub, e);
            return Err(AuthRejection::Unavailable);
        }
    };

    if !classifier.matches_principal(&token, &principal, now) {
        warn!("Token does not match principal {}", principal.email);
        return Err(AuthRejection::InvalidToken);
    }

    debug!("Successfully authenticated user: {} for {}", principal.email, endpoint);
    request.extensions_mut().insert(CurrentPrincipal(principal));
    Ok(next.run(request).await)
}
