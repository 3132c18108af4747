// Credential authentication for the login flow

use crate::auth::{error::AuthError, password::PasswordVerifier, repository::UserStore};
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Checked against when the email is unknown, keeping both failure paths at one hash check
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

/// Checks an email/password pair.
///
/// Any mismatch, including an unknown email, is reported as
/// [`AuthError::InvalidCredentials`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<(), AuthError>;
}

/// Authenticates against the user store's stored password hash
pub struct StoreAuthenticator {
    store: Arc<dyn UserStore>,
    passwords: Arc<dyn PasswordVerifier>,
    decoy_hash: OnceLock<String>,
}

impl StoreAuthenticator {
    pub fn new(store: Arc<dyn UserStore>, passwords: Arc<dyn PasswordVerifier>) -> Self {
        Self {
            store,
            passwords,
            decoy_hash: OnceLock::new(),
        }
    }

    /// Hash of [`DECOY_PASSWORD`] in the verifier's own format, computed on first use
    fn decoy_hash(&self) -> Result<&str, AuthError> {
        if let Some(hash) = self.decoy_hash.get() {
            return Ok(hash.as_str());
        }
        let hash = self.passwords.hash(DECOY_PASSWORD)?;
        Ok(self.decoy_hash.get_or_init(|| hash).as_str())
    }
}

#[async_trait]
impl Authenticator for StoreAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let Some(principal) = self.store.find_by_email(email).await? else {
            // Outcome is discarded; only the cost matters
            let _ = self.passwords.verify(password, self.decoy_hash()?, email);
            warn!("Login attempt for unknown account");
            return Err(AuthError::InvalidCredentials);
        };

        if self
            .passwords
            .verify(password, &principal.password_hash, &principal.email)?
        {
            Ok(())
        } else {
            warn!("Login attempt with wrong password for {}", principal.email);
            Err(AuthError::InvalidCredentials)
        }
    }
}
