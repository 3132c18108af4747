// Application configuration
// Loaded once from the environment at startup and passed into the services

use std::fmt;
use thiserror::Error;

/// Default access token lifetime: 24 hours
pub const DEFAULT_ACCESS_EXPIRATION_MS: i64 = 86_400_000;
/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_EXPIRATION_MS: i64 = 604_800_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Signing secret and token lifetimes
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_expiration_ms: i64,
    pub refresh_expiration_ms: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_expiration_ms: DEFAULT_ACCESS_EXPIRATION_MS,
            refresh_expiration_ms: DEFAULT_REFRESH_EXPIRATION_MS,
        }
    }

    pub fn with_lifetimes(mut self, access_ms: i64, refresh_ms: i64) -> Self {
        self.access_expiration_ms = access_ms;
        self.refresh_expiration_ms = refresh_ms;
        self
    }
}

// Keeps the secret out of logs
impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("access_expiration_ms", &self.access_expiration_ms)
            .field("refresh_expiration_ms", &self.refresh_expiration_ms)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub token: TokenConfig,
}

impl AppConfig {
    /// Read configuration from environment variables
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => 8080,
        };

        let secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let access_expiration_ms =
            parse_millis(&lookup, "JWT_EXPIRATION_MS", DEFAULT_ACCESS_EXPIRATION_MS)?;
        let refresh_expiration_ms = parse_millis(
            &lookup,
            "JWT_REFRESH_EXPIRATION_MS",
            DEFAULT_REFRESH_EXPIRATION_MS,
        )?;

        Ok(Self {
            database_url,
            host,
            port,
            token: TokenConfig::new(secret)
                .with_lifetimes(access_expiration_ms, refresh_expiration_ms),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_millis<F>(lookup: &F, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
