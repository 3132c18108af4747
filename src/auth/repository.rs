// User store: the persistence seam used by the auth flows

use crate::auth::{
    error::StoreError,
    models::{NewPrincipal, Principal, Role},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;

/// Principal persistence. Email lookups are case-insensitive.
///
/// `insert` must reject a second principal with the same email with
/// [`StoreError::DuplicateEmail`], even when racing another insert.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    /// Persist a new principal and return it with its assigned id
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError>;

    /// Write back an existing principal
    async fn update(&self, principal: &Principal) -> Result<Principal, StoreError>;
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(StoreError::Database)?;
        Ok(Principal {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
            last_login: row.last_login,
        })
    }
}

const PRINCIPAL_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, role, created_at, last_login";

/// PostgreSQL-backed user store
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists.0)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            PRINCIPAL_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Principal::try_from).transpose()
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        // A unique violation on the email index surfaces as DuplicateEmail
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "INSERT INTO users (first_name, last_name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PRINCIPAL_COLUMNS
        ))
        .bind(&principal.first_name)
        .bind(&principal.last_name)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Principal::try_from(row)
    }

    async fn update(&self, principal: &Principal) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "UPDATE users SET first_name = $1, last_name = $2, email = $3, password_hash = $4, \
             role = $5, last_login = $6 WHERE id = $7 RETURNING {}",
            PRINCIPAL_COLUMNS
        ))
        .bind(&principal.first_name)
        .bind(&principal.last_name)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .bind(principal.last_login)
        .bind(principal.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::Database(format!("user {} does not exist", principal.id)))?;

        Principal::try_from(row)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    principals: Vec<Principal>,
    last_id: i64,
}

/// In-process user store. The existence check and insert happen under one
/// write lock, so concurrent signups for one email cannot both succeed.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    state: RwLock<MemoryState>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.state.read().await.principals.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .principals
            .iter()
            .any(|p| p.email.eq_ignore_ascii_case(email)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .principals
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        let mut state = self.state.write().await;
        if state
            .principals
            .iter()
            .any(|p| p.email.eq_ignore_ascii_case(&principal.email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        state.last_id += 1;
        let stored = Principal {
            id: state.last_id,
            first_name: principal.first_name,
            last_name: principal.last_name,
            email: principal.email,
            password_hash: principal.password_hash,
            role: principal.role,
            created_at: Utc::now(),
            last_login: None,
        };
        state.principals.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, principal: &Principal) -> Result<Principal, StoreError> {
        let mut state = self.state.write().await;
        let slot = state
            .principals
            .iter_mut()
            .find(|p| p.id == principal.id)
            .ok_or_else(|| StoreError::Database(format!("user {} does not exist", principal.id)))?;
        *slot = principal.clone();
        Ok(principal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_principal(email: &str) -> NewPrincipal {
        NewPrincipal {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = InMemoryUserStore::new();
        let first = store.insert(new_principal("a@x.com")).await.unwrap();
        let second = store.insert(new_principal("b@x.com")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = InMemoryUserStore::new();
        store.insert(new_principal("Ada@X.com")).await.unwrap();

        assert!(store.exists_by_email("ada@x.com").await.unwrap());
        assert_eq!(
            store.find_by_email("ADA@x.COM").await.unwrap().unwrap().email,
            "Ada@X.com"
        );
        assert!(store.find_by_email("bob@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryUserStore::new();
        store.insert(new_principal("ada@x.com")).await.unwrap();

        let err = store.insert(new_principal("ADA@x.com")).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateEmail);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_admit_one() {
        let store = Arc::new(InMemoryUserStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(new_principal("race@x.com")).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_writes_through() {
        let store = InMemoryUserStore::new();
        let mut principal = store.insert(new_principal("ada@x.com")).await.unwrap();
        let login_at = Utc::now();
        principal.last_login = Some(login_at);

        store.update(&principal).await.unwrap();

        let stored = store.find_by_email("ada@x.com").await.unwrap().unwrap();
        assert_eq!(stored.last_login, Some(login_at));
    }

    #[tokio::test]
    async fn test_update_unknown_principal_fails() {
        let store = InMemoryUserStore::new();
        let mut ghost = store.insert(new_principal("ada@x.com")).await.unwrap();
        ghost.id = 99;

        assert!(matches!(store.update(&ghost).await, Err(StoreError::Database(_))));
    }
}
