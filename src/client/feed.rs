use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{EntryResponse, JournalBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// An entry not seen before, delivered oldest first.
    Entry(EntryResponse),
    /// The backend rejected the token; the feed has stopped.
    Expired,
}

/// Handle to a running feed. Dropping it stops the poller.
pub struct Subscription {
    cancel: CancellationToken,
    rx: mpsc::UnboundedReceiver<FeedEvent>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Next buffered event, without waiting.
    pub fn try_next(&mut self) -> Option<FeedEvent> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next event; `None` once the feed has stopped.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Poll-based "new entries" subscription over [`JournalBackend::list_entries`].
pub struct EntryFeed;

impl EntryFeed {
    pub fn spawn<B: JournalBackend>(
        backend: Arc<B>,
        token: String,
        user_id: Uuid,
        mut seen: HashSet<Uuid>,
        every: Duration,
    ) -> Subscription {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let entries = tokio::select! {
                    _ = stop.cancelled() => break,
                    res = backend.list_entries(&token, user_id) => res,
                };

                match entries {
                    Ok(entries) => {
                        // Listing is newest first; deliver oldest first so
                        // prepending keeps the held list sorted.
                        for entry in entries.into_iter().rev() {
                            if seen.insert(entry.id) && tx.send(FeedEvent::Entry(entry)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) if e.is_unauthorized() => {
                        warn!(%user_id, "entry feed stopped: token rejected");
                        let _ = tx.send(FeedEvent::Expired);
                        break;
                    }
                    Err(e) => debug!(error = %e, "entry feed poll failed; will retry"),
                }
            }
            debug!(%user_id, "entry feed finished");
        });

        Subscription { cancel, rx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{testing::spawn_backend, ApiClient};

    #[tokio::test]
    async fn delivers_only_unseen_entries_until_cancelled() {
        let api = Arc::new(ApiClient::new(spawn_backend().await).unwrap());
        let auth = api.register("a@x.com", "pw1234", "A").await.unwrap();
        let user_id = auth.user.id;

        let old = api.create_entry(&auth.token, user_id, "old").await.unwrap();
        let seen = HashSet::from([old.id]);

        let mut sub = EntryFeed::spawn(
            api.clone(),
            auth.token.clone(),
            user_id,
            seen,
            Duration::from_millis(20),
        );

        let a = api.create_entry(&auth.token, user_id, "a").await.unwrap();
        let b = api.create_entry(&auth.token, user_id, "b").await.unwrap();

        let mut got = Vec::new();
        while got.len() < 2 {
            match tokio::time::timeout(Duration::from_secs(5), sub.next()).await {
                Ok(Some(FeedEvent::Entry(e))) => got.push(e.id),
                other => panic!("unexpected feed state: {other:?}"),
            }
        }
        assert!(got.contains(&a.id) && got.contains(&b.id));
        assert!(!got.contains(&old.id));

        sub.cancel();
        assert!(sub.is_cancelled());
        assert!(tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reports_expiry_and_stops() {
        let api = Arc::new(ApiClient::new(spawn_backend().await).unwrap());
        let auth = api.register("a@x.com", "pw1234", "A").await.unwrap();
        api.logout(&auth.token).await.unwrap();

        let mut sub = EntryFeed::spawn(
            api,
            auth.token,
            auth.user.id,
            HashSet::new(),
            Duration::from_millis(10),
        );
        let event = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .unwrap();
        assert_eq!(event, Some(FeedEvent::Expired));
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(5), sub.next())
                .await
                .unwrap(),
            None
        );
        tokio::time::timeout(Duration::from_secs(5), async {
            while !sub.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poller task should finish after expiry");
        assert!(!sub.is_cancelled());
    }
}
