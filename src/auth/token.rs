// Token codec: builds, signs and verifies HS256 tokens

use crate::auth::error::TokenError;
use crate::config::TokenConfig;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// HS256 needs at least a 256-bit key
pub const MIN_SECRET_BYTES: usize = 32;

/// Claims carry whole seconds, so shorter lifetimes could collapse to `exp == iat`
pub const MIN_LIFETIME_MS: i64 = 1_000;

/// Ten years; longer lifetimes push `exp` towards the edge of chrono's range
pub const MAX_LIFETIME_MS: i64 = 10 * 366 * 24 * 60 * 60 * 1_000;

/// Claim names owned by the codec. Values supplied for these in extra claims
/// are discarded; the codec's own values always win.
pub const RESERVED_CLAIMS: [&str; 4] = ["sub", "iat", "exp", "token_type"];

/// What a token may authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Authorizes API calls
    Access,
    /// Authorizes only the refresh flow
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the principal's email
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
    pub token_type: TokenKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// True when the expiration instant lies strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp.saturating_mul(1000) < now.timestamp_millis()
    }
}

/// Signs and verifies tokens with a symmetric key fixed at construction
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenCodec {
    /// Build the codec from startup configuration.
    ///
    /// Fails if the secret is shorter than [`MIN_SECRET_BYTES`] or a lifetime
    /// lies outside [`MIN_LIFETIME_MS`]..=[`MAX_LIFETIME_MS`].
    pub fn new(config: &TokenConfig) -> Result<Self, TokenError> {
        let secret = config.secret.as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(TokenError::Configuration(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_SECRET_BYTES,
                secret.len()
            )));
        }

        let access_lifetime = checked_lifetime("access", config.access_expiration_ms)?;
        let refresh_lifetime = checked_lifetime("refresh", config.refresh_expiration_ms)?;

        // Expiry is checked by the classifier against an explicit clock
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_lifetime,
            refresh_lifetime,
        })
    }

    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_lifetime,
            TokenKind::Refresh => self.refresh_lifetime,
        }
    }

    /// Access token lifetime in whole seconds, as reported in `expiresIn`
    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime.num_seconds()
    }

    /// Mint a signed token of `kind` for `subject`, issued at `now`
    pub fn mint(
        &self,
        subject: &str,
        kind: TokenKind,
        extra_claims: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let mut extra = Map::new();
        for (name, value) in extra_claims {
            if RESERVED_CLAIMS.contains(&name.as_str()) {
                debug!("Dropping reserved claim '{}' from extra claims", name);
                continue;
            }
            extra.insert(name.clone(), value.clone());
        }

        let expires_at = now.checked_add_signed(self.lifetime(kind)).ok_or_else(|| {
            TokenError::Configuration(format!("{} token expiry out of range", kind))
        })?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            token_type: kind,
            extra,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify the signature, then decode the claims.
    ///
    /// Does not look at expiry.
    pub fn parse(&self, raw: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(raw, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(malformed)?;

        if claims.exp <= claims.iat {
            return Err(TokenError::Malformed(
                "expiration is not after issued-at".to_string(),
            ));
        }

        Ok(claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .finish_non_exhaustive()
    }
}

fn checked_lifetime(name: &str, value_ms: i64) -> Result<Duration, TokenError> {
    if !(MIN_LIFETIME_MS..=MAX_LIFETIME_MS).contains(&value_ms) {
        return Err(TokenError::Configuration(format!(
            "{} token lifetime must be between {} and {} ms, got {}",
            name, MIN_LIFETIME_MS, MAX_LIFETIME_MS, value_ms
        )));
    }
    Duration::try_milliseconds(value_ms).ok_or_else(|| {
        TokenError::Configuration(format!("{} token lifetime out of range", name))
    })
}

fn malformed(err: jsonwebtoken::errors::Error) -> TokenError {
    let reason = match err.kind() {
        ErrorKind::InvalidSignature => "signature mismatch".to_string(),
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            "unsupported signing algorithm".to_string()
        }
        ErrorKind::MissingRequiredClaim(claim) => format!("missing claim '{}'", claim),
        ErrorKind::Json(e) => format!("invalid claims: {}", e),
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
            "corrupt token encoding".to_string()
        }
        other => format!("{:?}", other),
    };
    TokenError::Malformed(reason)
}
