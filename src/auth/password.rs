// Password hashing and verification

use crate::auth::error::AuthError;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier as _, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{debug, error};

/// Hashes new passwords and checks presented ones against stored hashes
pub trait PasswordVerifier: Send + Sync {
    fn hash(&self, raw_password: &str) -> Result<String, AuthError>;

    /// `Ok(false)` on mismatch; `email` is only used for diagnostics
    fn verify(&self, raw_password: &str, hashed_password: &str, email: &str)
        -> Result<bool, AuthError>;
}

/// Argon2id password service producing PHC-format hashes
#[derive(Debug, Default, Clone, Copy)]
pub struct PasswordService;

impl PasswordService {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordVerifier for PasswordService {
    fn hash(&self, raw_password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(raw_password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswordHash(e.to_string()))
    }

    fn verify(
        &self,
        raw_password: &str,
        hashed_password: &str,
        email: &str,
    ) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hashed_password).map_err(|e| {
            error!("Stored password hash for {} is unreadable: {}", email, e);
            AuthError::PasswordHash(e.to_string())
        })?;

        match Argon2::default().verify_password(raw_password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => {
                debug!("Password mismatch for {}", email);
                Ok(false)
            }
            Err(e) => Err(AuthError::PasswordHash(e.to_string())),
        }
    }
}
