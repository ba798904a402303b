//! Client side of the journal: a typed HTTP client for the backend and the
//! session controller that drives sign-in, compose, submit and listing.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod api;
pub mod controller;
pub mod feed;
pub mod token;
pub mod words;

pub use crate::auth::dto::{AuthResponse, PublicUser};
pub use crate::journal::dto::EntryResponse;
pub use api::ApiClient;
pub use controller::{AuthState, SessionController, SubmitState};
pub use feed::{EntryFeed, FeedEvent, Subscription};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Missing, expired or revoked token, or bad credentials.
    #[error("{0}")]
    Unauthorized(String),
    /// Rejected locally before any request was sent.
    #[error("{0}")]
    Invalid(String),
    #[error("Server error: {message}")]
    Server { status: u16, message: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}

/// Everything the controller needs from the backend.
#[async_trait]
pub trait JournalBackend: Send + Sync + 'static {
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthResponse, ClientError>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError>;
    async fn me(&self, token: &str) -> Result<PublicUser, ClientError>;
    async fn logout(&self, token: &str) -> Result<(), ClientError>;
    async fn create_entry(
        &self,
        token: &str,
        user_id: Uuid,
        content: &str,
    ) -> Result<EntryResponse, ClientError>;
    async fn list_entries(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Vec<EntryResponse>, ClientError>;
    async fn update_email(&self, token: &str, email: &str) -> Result<PublicUser, ClientError>;
}
