use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::repo::StoreError;
use crate::insight::InsightError;

/// Error taxonomy shared by every HTTP-facing operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,

    #[error("Insight service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Insight service returned an unexpected response: {0}")]
    UpstreamMalformed(String),

    #[error("Internal server error")]
    ServerFault(#[from] anyhow::Error),
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable(_) | AppError::UpstreamMalformed(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::ServerFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::ServerFault(e) = &self {
            error!(error = ?e, "server fault");
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => AppError::Conflict("Email already registered".into()),
            StoreError::Other(e) => AppError::ServerFault(e),
        }
    }
}

impl From<InsightError> for AppError {
    fn from(e: InsightError) -> Self {
        match e {
            InsightError::Unavailable(msg) => AppError::UpstreamUnavailable(msg),
            InsightError::Malformed(msg) => AppError::UpstreamMalformed(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Invalid(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::Invalid(e.body_text())
    }
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
