use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::journal::repo_types::JournalEntry;

/// Wire shape of an entry: `{id, content, userId, createdAt, aiInsight}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub ai_insight: Option<String>,
}

impl From<JournalEntry> for EntryResponse {
    fn from(e: JournalEntry) -> Self {
        Self {
            id: e.id,
            content: e.content,
            user_id: e.user_id,
            created_at: e.created_at,
            ai_insight: e.ai_insight,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub content: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// An insight the client already obtained; skips the generator.
    #[serde(default)]
    pub ai_insight: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
}
