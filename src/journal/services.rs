use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::insight::InsightGenerator;
use crate::journal::{repo::EntryStore, repo_types::JournalEntry};

/// Creates and lists entries for an authenticated user.
///
/// When the insight generator fails the entry is still stored, with no
/// insight attached.
#[derive(Clone)]
pub struct JournalService {
    entries: Arc<dyn EntryStore>,
    insights: Arc<dyn InsightGenerator>,
}

impl JournalService {
    pub fn new(entries: Arc<dyn EntryStore>, insights: Arc<dyn InsightGenerator>) -> Self {
        Self { entries, insights }
    }

    pub async fn create_entry(&self, user_id: Uuid, content: &str) -> Result<JournalEntry, AppError> {
        self.create_entry_with(user_id, content, None).await
    }

    /// `precomputed` is an insight the caller already holds; the generator
    /// is only consulted when it is absent or blank.
    #[instrument(skip(self, content, precomputed))]
    pub async fn create_entry_with(
        &self,
        user_id: Uuid,
        content: &str,
        precomputed: Option<String>,
    ) -> Result<JournalEntry, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::Invalid("Journal entry cannot be empty".into()));
        }

        let insight = match precomputed.filter(|s| !s.trim().is_empty()) {
            Some(insight) => Some(insight),
            None => match self.insights.analyze(content).await {
                Ok(insight) => Some(insight),
                Err(e) => {
                    warn!(error = %e, %user_id, "insight generation failed; storing entry without insight");
                    None
                }
            },
        };

        let entry = self
            .entries
            .insert(user_id, content, insight.as_deref())
            .await?;
        info!(entry_id = %entry.id, %user_id, has_insight = entry.ai_insight.is_some(), "journal entry created");
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn list_entries(&self, user_id: Uuid) -> Result<Vec<JournalEntry>, AppError> {
        Ok(self.entries.list_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::{DisabledInsights, InsightError};
    use crate::journal::repo::MemoryEntryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingInsights {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InsightGenerator for CountingInsights {
        async fn analyze(&self, content: &str) -> Result<String, InsightError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("insight for {content}"))
        }
    }

    struct MalformedInsights;

    #[async_trait]
    impl InsightGenerator for MalformedInsights {
        async fn analyze(&self, _content: &str) -> Result<String, InsightError> {
            Err(InsightError::Malformed("no candidate text".into()))
        }
    }

    fn service(insights: Arc<dyn InsightGenerator>) -> JournalService {
        JournalService::new(Arc::new(MemoryEntryStore::new()), insights)
    }

    #[tokio::test]
    async fn create_attaches_generated_insight() {
        let svc = service(Arc::new(CountingInsights::default()));
        let user = Uuid::new_v4();
        let entry = svc.create_entry(user, "Feeling good today").await.unwrap();
        assert_eq!(entry.user_id, user);
        assert_eq!(entry.content, "Feeling good today");
        assert_eq!(entry.ai_insight.as_deref(), Some("insight for Feeling good today"));
    }

    #[tokio::test]
    async fn empty_content_is_invalid_and_not_analyzed() {
        let insights = Arc::new(CountingInsights::default());
        let svc = service(insights.clone());
        for content in ["", "   ", "\n\t"] {
            assert!(matches!(
                svc.create_entry(Uuid::new_v4(), content).await,
                Err(AppError::Invalid(_))
            ));
        }
        assert_eq!(insights.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generator_failure_degrades_to_no_insight() {
        for insights in [
            Arc::new(DisabledInsights) as Arc<dyn InsightGenerator>,
            Arc::new(MalformedInsights) as Arc<dyn InsightGenerator>,
        ] {
            let svc = service(insights);
            let user = Uuid::new_v4();
            let entry = svc.create_entry(user, "still saved").await.unwrap();
            assert!(entry.ai_insight.is_none());
            assert_eq!(svc.list_entries(user).await.unwrap(), vec![entry]);
        }
    }

    #[tokio::test]
    async fn precomputed_insight_skips_generator() {
        let insights = Arc::new(CountingInsights::default());
        let svc = service(insights.clone());
        let entry = svc
            .create_entry_with(Uuid::new_v4(), "hello", Some("from client".into()))
            .await
            .unwrap();
        assert_eq!(entry.ai_insight.as_deref(), Some("from client"));
        assert_eq!(insights.calls.load(Ordering::SeqCst), 0);

        svc.create_entry_with(Uuid::new_v4(), "hello", Some("  ".into()))
            .await
            .unwrap();
        assert_eq!(insights.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_is_scoped_sorted_and_stable() {
        let svc = service(Arc::new(CountingInsights::default()));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        assert!(svc.list_entries(alice).await.unwrap().is_empty());

        let a1 = svc.create_entry(alice, "a1").await.unwrap();
        svc.create_entry(bob, "b1").await.unwrap();
        let a2 = svc.create_entry(alice, "a2").await.unwrap();
        assert!(a2.created_at >= a1.created_at);

        let first = svc.list_entries(alice).await.unwrap();
        assert_eq!(first.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a2.id, a1.id]);
        assert_eq!(svc.list_entries(alice).await.unwrap(), first);
    }
}
