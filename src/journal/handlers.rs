use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    journal::{
        dto::{CreateEntryRequest, EntryResponse, ListQuery},
        services::JournalService,
    },
    state::AppState,
};

pub fn journal_routes() -> Router<AppState> {
    Router::new().route("/journal", get(list_entries).post(create_entry))
}

/// A `userId` supplied by the client must name the token's own user.
fn ensure_same_user(claimed: Option<Uuid>, actual: Uuid) -> Result<(), AppError> {
    match claimed {
        Some(claimed) if claimed != actual => {
            warn!(%claimed, %actual, "userId does not match token subject");
            Err(AppError::Unauthorized("userId does not match the authenticated user".into()))
        }
        _ => Ok(()),
    }
}

#[instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn create_entry(
    State(journal): State<JournalService>,
    AuthUser(session): AuthUser,
    payload: Result<Json<CreateEntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EntryResponse>), AppError> {
    let Json(payload) = payload?;
    ensure_same_user(payload.user_id, session.user.id)?;
    let entry = journal
        .create_entry_with(session.user.id, &payload.content, payload.ai_insight)
        .await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

#[instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn list_entries(
    State(journal): State<JournalService>,
    AuthUser(session): AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<EntryResponse>>, AppError> {
    let Query(query) = query?;
    ensure_same_user(query.user_id, session.user.id)?;
    let entries = journal.list_entries(session.user.id).await?;
    Ok(Json(entries.into_iter().map(EntryResponse::from).collect()))
}
