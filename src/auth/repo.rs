use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{RevokedToken, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate;
            }
        }
        StoreError::Other(e.into())
    }
}

/// Persists user records and the token revocation list.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn create(&self, email: &str, name: &str, password_hash: &str)
        -> Result<User, StoreError>;
    /// Returns `None` when no user has this id.
    async fn update_email(&self, id: Uuid, email: &str) -> Result<Option<User>, StoreError>;
    async fn revoke_token(&self, jti: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError>;
    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, name, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_email(&self, id: Uuid, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET email = $2
            WHERE id = $1
            RETURNING id, email, name, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        sqlx::query(r#"DELETE FROM revoked_tokens WHERE expires_at < now()"#)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query_as::<_, RevokedToken>(
            r#"SELECT jti, expires_at FROM revoked_tokens WHERE jti = $1"#,
        )
        .bind(jti)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.is_some())
    }
}

#[derive(Default)]
struct MemoryUsers {
    users: HashMap<Uuid, User>,
    revoked: HashMap<Uuid, OffsetDateTime>,
}

/// In-process credential store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<MemoryUsers>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == email) {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_email(&self, id: Uuid, email: &str) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == email && u.id != id) {
            return Err(StoreError::Duplicate);
        }
        Ok(inner.users.get_mut(&id).map(|u| {
            u.email = email.to_string();
            u.clone()
        }))
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.inner.write().await;
        inner.revoked.retain(|_, exp| *exp >= now);
        inner.revoked.insert(jti, expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.revoked.contains_key(&jti))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryCredentialStore::new();
        store.create("a@x.com", "A", "hash").await.unwrap();
        let err = store.create("a@x.com", "B", "hash").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn update_email_keeps_uniqueness() {
        let store = MemoryCredentialStore::new();
        let a = store.create("a@x.com", "A", "h").await.unwrap();
        store.create("b@x.com", "B", "h").await.unwrap();

        let err = store.update_email(a.id, "b@x.com").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));

        // Re-saving the same address is not a conflict with oneself.
        let same = store.update_email(a.id, "a@x.com").await.unwrap().unwrap();
        assert_eq!(same.email, "a@x.com");

        let moved = store.update_email(a.id, "c@x.com").await.unwrap().unwrap();
        assert_eq!(moved.email, "c@x.com");
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
        assert!(store.update_email(Uuid::new_v4(), "d@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revocation_purges_expired_entries() {
        let store = MemoryCredentialStore::new();
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        store.revoke_token(old, now - Duration::hours(1)).await.unwrap();
        assert!(store.is_token_revoked(old).await.unwrap());

        store.revoke_token(fresh, now + Duration::hours(1)).await.unwrap();
        assert!(store.is_token_revoked(fresh).await.unwrap());
        assert!(!store.is_token_revoked(old).await.unwrap());
    }
}
