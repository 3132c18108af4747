// Authentication data models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::validate_not_blank;

/// Role assigned to a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Wire and storage form ("USER" / "ADMIN")
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Administrator",
        }
    }

    /// Admins hold every permission; users may only read and update their own profile
    pub fn has_permission(&self, permission: &str) -> bool {
        match self {
            Role::Admin => true,
            Role::User => matches!(permission, "READ_PROFILE" | "UPDATE_PROFILE"),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Stored user record
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Insert shape for a principal; the store assigns id and created_at
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Public summary of a principal (excludes password_hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "USER")]
    pub role: String,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<&Principal> for UserInfo {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            first_name: principal.first_name.clone(),
            last_name: principal.last_name.clone(),
            email: principal.email.clone(),
            role: principal.role.to_string(),
        }
    }
}

/// Registration request DTO
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(length(max = 50), custom = "validate_not_blank")]
    #[schema(example = "Ada")]
    pub first_name: String,
    #[validate(length(max = 50), custom = "validate_not_blank")]
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[validate(email, length(max = 100))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(length(min = 6, max = 100))]
    #[schema(example = "secret1")]
    pub password: String,
}

/// Login request DTO
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(custom = "validate_not_blank")]
    #[schema(example = "secret1")]
    pub password: String,
}

/// Token refresh request DTO
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(custom = "validate_not_blank")]
    pub refresh_token: String,
}

/// Requests that authenticate a caller from raw credentials
#[derive(Debug, Clone)]
pub enum AuthRequest {
    SignUp(SignUpRequest),
    Login(LoginRequest),
}

pub const BEARER_TOKEN_TYPE: &str = "Bearer";
pub const SUCCESS_MESSAGE: &str = "Authentication successful";

/// Unified response for signup, login and refresh.
///
/// Either the token fields and `user_info` are populated (success) or only
/// `message` is (failure). `None` fields are omitted from the JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Bearer")]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 86400)]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    pub timestamp: DateTime<Utc>,
}

impl AuthResponse {
    pub fn success(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        user_info: UserInfo,
    ) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            token_type: Some(BEARER_TOKEN_TYPE.to_string()),
            expires_in: Some(expires_in),
            message: Some(SUCCESS_MESSAGE.to_string()),
            user_info: Some(user_info),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            token_type: None,
            expires_in: None,
            message: Some(message.into()),
            user_info: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.access_token.is_some()
    }
}
