use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    claims::{Claims, JwtKeys},
    password::{hash_password, verify_password},
    repo::CredentialStore,
    repo_types::User,
};
use crate::error::AppError;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user resolved from a bearer token, together with the token's claims.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub claims: Claims,
}

/// Registration, login, token resolution and revocation.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn CredentialStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    #[instrument(skip(self, password, name))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<(User, String), AppError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(%email, "invalid email");
            return Err(AppError::Invalid("Invalid email".into()));
        }
        if password.is_empty() {
            return Err(AppError::Invalid("Password is required".into()));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Invalid("Name is required".into()));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let hash = hash_password(password)?;
        // A concurrent registration can still win the race; the store's
        // unique constraint turns that into Duplicate -> Conflict.
        let user = self.users.create(&email, name, &hash).await?;
        let token = self.keys.sign(user.id)?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok((user, token))
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AppError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(%email, "login unknown email");
            return Err(invalid_credentials());
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(invalid_credentials());
        }

        let token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, token))
    }

    /// Gate in front of every authenticated operation.
    pub async fn resolve_token(&self, token: &str) -> Result<Session, AppError> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        if self.users.is_token_revoked(claims.jti).await? {
            warn!(user_id = %claims.sub, "revoked token presented");
            return Err(AppError::Unauthorized("Token has been revoked".into()));
        }

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

        Ok(Session { user, claims })
    }

    /// Revokes the token server-side; later `resolve_token` calls with it fail.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let session = self.resolve_token(token).await?;
        self.users
            .revoke_token(session.claims.jti, session.claims.expires_at())
            .await?;
        info!(user_id = %session.user.id, "user logged out");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_email(&self, user_id: Uuid, email: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::Invalid("Invalid email".into()));
        }
        let user = self
            .users
            .update_email(user_id, &email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
        info!(user_id = %user.id, "email updated");
        Ok(user)
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".into())
}
