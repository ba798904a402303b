use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{AuthResponse, ClientError, EntryResponse, JournalBackend, PublicUser};
use crate::auth::dto::{MessageResponse, UserResponse};

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Typed client for the backend's `/api` surface.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` includes the `/api` prefix, e.g. `http://localhost:8080/api`.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = req
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let message = match res.json::<ErrorResponse>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            };
            debug!(%status, %message, "backend returned error");
            return Err(match status {
                StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
                _ => ClientError::Server {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        res.json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl JournalBackend for ApiClient {
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = json!({"email": email, "password": password, "name": name});
        self.send(self.http.post(self.url("/auth/register")).json(&body))
            .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = json!({"email": email, "password": password});
        self.send(self.http.post(self.url("/auth/login")).json(&body))
            .await
    }

    async fn me(&self, token: &str) -> Result<PublicUser, ClientError> {
        let res: UserResponse = self
            .send(self.http.get(self.url("/auth/me")).bearer_auth(token))
            .await?;
        Ok(res.user)
    }

    async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let _: MessageResponse = self
            .send(self.http.post(self.url("/auth/logout")).bearer_auth(token))
            .await?;
        Ok(())
    }

    async fn create_entry(
        &self,
        token: &str,
        user_id: Uuid,
        content: &str,
    ) -> Result<EntryResponse, ClientError> {
        let body = json!({"content": content, "userId": user_id});
        self.send(
            self.http
                .post(self.url("/journal"))
                .bearer_auth(token)
                .json(&body),
        )
        .await
    }

    async fn list_entries(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Vec<EntryResponse>, ClientError> {
        self.send(
            self.http
                .get(self.url(&format!("/journal?userId={user_id}")))
                .bearer_auth(token),
        )
        .await
    }

    async fn update_email(&self, token: &str, email: &str) -> Result<PublicUser, ClientError> {
        let res: UserResponse = self
            .send(
                self.http
                    .patch(self.url("/users/profile"))
                    .bearer_auth(token)
                    .json(&json!({"email": email})),
            )
            .await?;
        Ok(res.user)
    }
}
