use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::StoreError;
use crate::journal::repo_types::JournalEntry;

/// Append-only, per-user entry storage. Entries come back newest first.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Assigns id and `created_at`; `created_at` never goes backwards for a user.
    async fn insert(
        &self,
        user_id: Uuid,
        content: &str,
        ai_insight: Option<&str>,
    ) -> Result<JournalEntry, StoreError>;

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<JournalEntry>, StoreError>;
}

#[derive(Clone)]
pub struct PgEntryStore {
    db: PgPool,
}

impl PgEntryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        content: &str,
        ai_insight: Option<&str>,
    ) -> Result<JournalEntry, StoreError> {
        let entry = sqlx::query_as::<_, JournalEntry>(
            r#"
            INSERT INTO journal_entries (id, user_id, content, ai_insight, created_at)
            VALUES (
                $1, $2, $3, $4,
                GREATEST(
                    now(),
                    COALESCE(
                        (SELECT MAX(created_at) FROM journal_entries WHERE user_id = $2),
                        now()
                    )
                )
            )
            RETURNING id, user_id, content, ai_insight, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content)
        .bind(ai_insight)
        .fetch_one(&self.db)
        .await?;
        Ok(entry)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<JournalEntry>, StoreError> {
        let rows = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, user_id, content, ai_insight, created_at
            FROM journal_entries
            WHERE user_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/// In-process entry store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryEntryStore {
    // (insertion sequence, entry)
    rows: RwLock<Vec<(u64, JournalEntry)>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        content: &str,
        ai_insight: Option<&str>,
    ) -> Result<JournalEntry, StoreError> {
        let mut rows = self.rows.write().await;
        let latest = rows
            .iter()
            .filter(|(_, e)| e.user_id == user_id)
            .map(|(_, e)| e.created_at)
            .max();
        let now = OffsetDateTime::now_utc();
        let created_at = latest.map_or(now, |l| l.max(now));

        let entry = JournalEntry {
            id: Uuid::new_v4(),
            user_id,
            content: content.to_string(),
            ai_insight: ai_insight.map(str::to_string),
            created_at,
        };
        let seq = rows.len() as u64;
        rows.push((seq, entry.clone()));
        Ok(entry)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<JournalEntry>, StoreError> {
        let rows = self.rows.read().await;
        let mut owned: Vec<&(u64, JournalEntry)> =
            rows.iter().filter(|(_, e)| e.user_id == user_id).collect();
        owned.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(owned.into_iter().map(|(_, e)| e.clone()).collect())
    }
}
