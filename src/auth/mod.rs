// Authentication module
// Issues, verifies and refreshes signed bearer tokens for signup, login and refresh

pub mod authenticator;
pub mod classifier;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use authenticator::{Authenticator, StoreAuthenticator};
pub use classifier::{TokenClassifier, ValidationOutcome};
pub use error::{AuthError, StoreError, TokenError};
pub use handlers::{login_handler, me_handler, refresh_handler, signup_handler};
pub use middleware::{require_bearer, AuthRejection, CurrentPrincipal};
pub use models::{
    AuthRequest, AuthResponse, LoginRequest, NewPrincipal, Principal, RefreshRequest, Role,
    SignUpRequest, UserInfo,
};
pub use password::{PasswordService, PasswordVerifier};
pub use repository::{InMemoryUserStore, PgUserStore, UserStore};
pub use service::AuthService;
pub use token::{Claims, TokenCodec, TokenKind};
