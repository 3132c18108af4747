// Authentication service - orchestrates signup, login and token refresh

use crate::auth::{
    authenticator::Authenticator,
    classifier::{TokenClassifier, ValidationOutcome},
    error::{AuthError, REASON_NOT_REFRESH_TOKEN, REASON_REFRESH_EXPIRED},
    models::{
        AuthRequest, AuthResponse, LoginRequest, NewPrincipal, Principal, Role, SignUpRequest,
        UserInfo,
    },
    password::PasswordVerifier,
    repository::UserStore,
    token::{TokenCodec, TokenKind},
};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Authentication service coordinating all auth operations.
///
/// Holds no mutable state; share it behind an `Arc` across requests.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    passwords: Arc<dyn PasswordVerifier>,
    authenticator: Arc<dyn Authenticator>,
    classifier: TokenClassifier,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        passwords: Arc<dyn PasswordVerifier>,
        authenticator: Arc<dyn Authenticator>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            store,
            passwords,
            authenticator,
            classifier: TokenClassifier::new(codec),
        }
    }

    pub fn classifier(&self) -> &TokenClassifier {
        &self.classifier
    }

    pub fn codec(&self) -> &TokenCodec {
        self.classifier.codec()
    }

    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    /// Run the flow matching a credential-bearing request
    pub async fn authenticate(&self, request: AuthRequest) -> Result<AuthResponse, AuthError> {
        match request {
            AuthRequest::SignUp(request) => self.sign_up(&request).await,
            AuthRequest::Login(request) => self.login(&request).await,
        }
    }

    /// Register a new user and issue a token pair
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthResponse, AuthError> {
        info!("Attempting to register user with email: {}", request.email);

        if self.store.exists_by_email(&request.email).await? {
            warn!("Registration rejected, email already exists: {}", request.email);
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.passwords.hash(&request.password)?;

        // The pre-check above is racy; the store reports the loser as DuplicateEmail
        let principal = self
            .store
            .insert(NewPrincipal {
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                email: request.email.clone(),
                password_hash,
                role: Role::User,
            })
            .await?;

        let response = self.issue(&principal, &Map::new(), Utc::now())?;
        info!("Successfully registered user: {}", principal.email);
        Ok(response)
    }

    /// Authenticate credentials and issue a token pair
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        info!("Attempting to authenticate user: {}", request.email);

        self.authenticator
            .authenticate(&request.email, &request.password)
            .await?;

        let mut principal = self
            .store
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        let now = Utc::now();
        principal.last_login = Some(now);
        let principal = self.store.update(&principal).await?;

        let mut claims = Map::new();
        claims.insert("role".to_string(), json!(principal.role.as_str()));
        claims.insert("fullName".to_string(), json!(principal.full_name()));

        let response = self.issue(&principal, &claims, now)?;
        info!(
            "Successfully authenticated user: {} ({})",
            principal.email,
            principal.role.display_name()
        );
        Ok(response)
    }

    /// Exchange a valid refresh token for a fresh token pair
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        info!("Attempting to refresh token");

        if !self.classifier.is_kind(refresh_token, TokenKind::Refresh) {
            warn!("Refresh rejected: presented token is not a refresh token");
            return Err(AuthError::InvalidToken(REASON_NOT_REFRESH_TOKEN.to_string()));
        }

        let now = Utc::now();
        match self.classifier.classify(refresh_token, now) {
            ValidationOutcome::Valid(subject) => {
                let principal = self
                    .store
                    .find_by_email(&subject)
                    .await?
                    .ok_or(AuthError::PrincipalNotFound)?;

                let response = self.issue(&principal, &Map::new(), now)?;
                info!("Successfully refreshed token for user: {}", subject);
                Ok(response)
            }
            ValidationOutcome::Expired(subject) => {
                warn!("Refresh token expired for user: {}", subject);
                Err(AuthError::InvalidToken(REASON_REFRESH_EXPIRED.to_string()))
            }
            ValidationOutcome::Invalid(reason) => {
                warn!("Invalid refresh token: {}", reason);
                Err(AuthError::InvalidToken(reason))
            }
        }
    }

    /// Summary of an already authenticated principal
    pub async fn current_user(&self, email: &str) -> Result<UserInfo, AuthError> {
        self.store
            .find_by_email(email)
            .await?
            .map(|principal| UserInfo::from(&principal))
            .ok_or(AuthError::PrincipalNotFound)
    }

    /// Access token carries `access_claims`; the refresh token is always bare
    fn issue(
        &self,
        principal: &Principal,
        access_claims: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse, AuthError> {
        let codec = self.codec();
        let access_token = codec.mint(&principal.email, TokenKind::Access, access_claims, now)?;
        let refresh_token = codec.mint(&principal.email, TokenKind::Refresh, &Map::new(), now)?;

        Ok(AuthResponse::success(
            access_token,
            refresh_token,
            codec.access_lifetime_secs(),
            UserInfo::from(principal),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{
        authenticator::StoreAuthenticator,
        error::StoreError,
        password::PasswordService,
        repository::InMemoryUserStore,
        token::tests::{tamper_signature, test_codec},
    };
    use async_trait::async_trait;
    use chrono::Duration;

    pub(crate) fn service_with_store(store: Arc<dyn UserStore>) -> AuthService {
        let passwords: Arc<dyn PasswordVerifier> = Arc::new(PasswordService::new());
        let authenticator = Arc::new(StoreAuthenticator::new(store.clone(), passwords.clone()));
        AuthService::new(store, passwords, authenticator, Arc::new(test_codec()))
    }

    fn test_service() -> (AuthService, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        (service_with_store(store.clone()), store)
    }

    fn ada_signup() -> SignUpRequest {
        SignUpRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@x.com".to_string(),
            password: "secret1".to_string(),
        }
    }

    fn ada_login(password: &str) -> LoginRequest {
        LoginRequest {
            email: "ada@x.com".to_string(),
            password: password.to_string(),
        }
    }

    /// Says every email is free, then loses the insert race
    struct RacingStore;

    #[async_trait]
    impl UserStore for RacingStore {
        async fn exists_by_email(&self, _email: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<Principal>, StoreError> {
            Ok(None)
        }

        async fn insert(&self, _principal: NewPrincipal) -> Result<Principal, StoreError> {
            Err(StoreError::DuplicateEmail)
        }

        async fn update(&self, principal: &Principal) -> Result<Principal, StoreError> {
            Ok(principal.clone())
        }
    }

    /// Accepts any credentials, whether or not the account exists
    struct AcceptAll;

    #[async_trait]
    impl Authenticator for AcceptAll {
        async fn authenticate(&self, _email: &str, _password: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_signup_returns_token_pair() {
        let (service, store) = test_service();

        let response = service.sign_up(&ada_signup()).await.unwrap();

        assert!(response.is_success());
        assert!(!response.access_token.as_deref().unwrap().is_empty());
        assert!(!response.refresh_token.as_deref().unwrap().is_empty());
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
        assert_eq!(response.expires_in, Some(900));

        let info = response.user_info.unwrap();
        assert_eq!(info.email, "ada@x.com");
        assert_eq!(info.role, "USER");
        assert_eq!(info.full_name(), "Ada Lovelace");

        let stored = store.find_by_email("ada@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
    }

    #[tokio::test]
    async fn test_signup_tokens_have_expected_kinds() {
        let (service, _) = test_service();
        let response = service.sign_up(&ada_signup()).await.unwrap();

        let access = service.codec().parse(&response.access_token.unwrap()).unwrap();
        let refresh = service.codec().parse(&response.refresh_token.unwrap()).unwrap();

        assert_eq!(access.token_type, TokenKind::Access);
        assert_eq!(refresh.token_type, TokenKind::Refresh);
        assert_eq!(access.sub, "ada@x.com");
        assert!(access.extra.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_rejected() {
        let (service, store) = test_service();
        service.sign_up(&ada_signup()).await.unwrap();

        let err = service.sign_up(&ada_signup()).await.unwrap_err();

        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_lost_insert_race_is_duplicate_email() {
        let service = service_with_store(Arc::new(RacingStore));

        let err = service.sign_up(&ada_signup()).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_login_embeds_claims_in_access_token_only() {
        let (service, _) = test_service();
        service.sign_up(&ada_signup()).await.unwrap();

        let response = service.login(&ada_login("secret1")).await.unwrap();

        let access = service.codec().parse(response.access_token.as_deref().unwrap()).unwrap();
        let refresh = service.codec().parse(response.refresh_token.as_deref().unwrap()).unwrap();

        assert_eq!(access.extra.get("role"), Some(&json!("USER")));
        assert_eq!(access.extra.get("fullName"), Some(&json!("Ada Lovelace")));
        assert!(refresh.extra.is_empty());
    }

    #[tokio::test]
    async fn test_login_records_last_login() {
        let (service, store) = test_service();
        service.sign_up(&ada_signup()).await.unwrap();
        assert!(store.find_by_email("ada@x.com").await.unwrap().unwrap().last_login.is_none());

        service.login(&ada_login("secret1")).await.unwrap();

        assert!(store.find_by_email("ada@x.com").await.unwrap().unwrap().last_login.is_some());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_fails() {
        let (service, _) = test_service();
        service.sign_up(&ada_signup()).await.unwrap();

        let err = service.login(&ada_login("wrong-password")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_with_unknown_email_fails() {
        let (service, _) = test_service();

        let err = service.login(&ada_login("secret1")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_for_vanished_principal_is_typed() {
        let store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let service = AuthService::new(
            store,
            Arc::new(PasswordService::new()),
            Arc::new(AcceptAll),
            Arc::new(test_codec()),
        );

        let err = service.login(&ada_login("secret1")).await.unwrap_err();
        assert!(matches!(err, AuthError::PrincipalNotFound));
    }

    #[tokio::test]
    async fn test_authenticate_dispatches_by_request() {
        let (service, _) = test_service();

        let signup = service.authenticate(AuthRequest::SignUp(ada_signup())).await.unwrap();
        let login = service
            .authenticate(AuthRequest::Login(ada_login("secret1")))
            .await
            .unwrap();

        assert_eq!(signup.user_info, login.user_info);
    }

    #[tokio::test]
    async fn test_refresh_issues_new_pair() {
        let (service, _) = test_service();
        service.sign_up(&ada_signup()).await.unwrap();
        let issued_at = Utc::now() - Duration::hours(1);
        let original = service
            .codec()
            .mint("ada@x.com", TokenKind::Refresh, &Map::new(), issued_at)
            .unwrap();
        let original_iat = service.codec().parse(&original).unwrap().iat;

        let response = service.refresh_token(&original).await.unwrap();

        let access = service.codec().parse(&response.access_token.unwrap()).unwrap();
        let refresh = service.codec().parse(&response.refresh_token.unwrap()).unwrap();
        assert_eq!(access.token_type, TokenKind::Access);
        assert_eq!(refresh.token_type, TokenKind::Refresh);
        assert!(access.exp > original_iat);
        assert!(refresh.exp > original_iat);
        assert!(refresh.iat > original_iat);
        assert_eq!(response.user_info.unwrap().email, "ada@x.com");
    }

    #[tokio::test]
    async fn test_refresh_with_access_token_is_rejected() {
        let (service, _) = test_service();
        let response = service.sign_up(&ada_signup()).await.unwrap();

        let err = service
            .refresh_token(&response.access_token.unwrap())
            .await
            .unwrap_err();

        match err {
            AuthError::InvalidToken(reason) => assert_eq!(reason, REASON_NOT_REFRESH_TOKEN),
            other => panic!("Expected InvalidToken, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_with_expired_access_token_reports_kind_first() {
        let (service, _) = test_service();
        let stale_access = service
            .codec()
            .mint("ada@x.com", TokenKind::Access, &Map::new(), Utc::now() - Duration::days(10))
            .unwrap();

        match service.refresh_token(&stale_access).await.unwrap_err() {
            AuthError::InvalidToken(reason) => assert_eq!(reason, REASON_NOT_REFRESH_TOKEN),
            other => panic!("Expected InvalidToken, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_with_expired_token_is_rejected() {
        let (service, _) = test_service();
        service.sign_up(&ada_signup()).await.unwrap();
        let issued = Utc::now() - service.codec().lifetime(TokenKind::Refresh) - Duration::seconds(5);
        let expired = service
            .codec()
            .mint("ada@x.com", TokenKind::Refresh, &Map::new(), issued)
            .unwrap();

        match service.refresh_token(&expired).await.unwrap_err() {
            AuthError::InvalidToken(reason) => assert_eq!(reason, REASON_REFRESH_EXPIRED),
            other => panic!("Expected InvalidToken, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_with_tampered_token_is_rejected() {
        let (service, _) = test_service();
        let response = service.sign_up(&ada_signup()).await.unwrap();
        let tampered = tamper_signature(&response.refresh_token.unwrap());

        assert!(matches!(
            service.refresh_token(&tampered).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_subject_fails() {
        let (service, _) = test_service();
        let orphan = service
            .codec()
            .mint("ghost@x.com", TokenKind::Refresh, &Map::new(), Utc::now())
            .unwrap();

        assert!(matches!(
            service.refresh_token(&orphan).await,
            Err(AuthError::PrincipalNotFound)
        ));
    }

    #[tokio::test]
    async fn test_current_user() {
        let (service, _) = test_service();
        service.sign_up(&ada_signup()).await.unwrap();

        let info = service.current_user("ada@x.com").await.unwrap();
        assert_eq!(info.first_name, "Ada");
        assert!(matches!(
            service.current_user("bob@x.com").await,
            Err(AuthError::PrincipalNotFound)
        ));
    }
}
