// Token classification: kind and validity as values, never as errors

use crate::auth::{
    models::Principal,
    token::{TokenCodec, TokenKind},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Result of checking a raw token against the clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Verified and not yet expired; carries the subject
    Valid(String),
    /// Verified but expired; carries the subject
    Expired(String),
    /// Failed verification or decoding; carries the reason
    Invalid(String),
}

/// Classifies raw tokens using a shared codec.
///
/// Expiry comparisons use the caller's clock with zero tolerance; clock skew
/// between issuer and verifier is not compensated.
#[derive(Debug, Clone)]
pub struct TokenClassifier {
    codec: Arc<TokenCodec>,
}

impl TokenClassifier {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn classify(&self, raw: &str, now: DateTime<Utc>) -> ValidationOutcome {
        match self.codec.parse(raw) {
            Ok(claims) if claims.is_expired_at(now) => {
                debug!("Token for {} expired at {}", claims.sub, claims.exp);
                ValidationOutcome::Expired(claims.sub)
            }
            Ok(claims) => ValidationOutcome::Valid(claims.sub),
            Err(err) => {
                debug!("Token rejected: {}", err);
                ValidationOutcome::Invalid(err.to_string())
            }
        }
    }

    /// True if the token verifies and carries `kind`, regardless of expiry
    pub fn is_kind(&self, raw: &str, kind: TokenKind) -> bool {
        self.codec
            .parse(raw)
            .map(|claims| claims.token_type == kind)
            .unwrap_or(false)
    }

    /// Authorization gate: subject is this principal and the token is valid at `now`
    pub fn matches_principal(&self, raw: &str, principal: &Principal, now: DateTime<Utc>) -> bool {
        match self.classify(raw, now) {
            ValidationOutcome::Valid(subject) => subject == principal.email,
            _ => false,
        }
    }
}
