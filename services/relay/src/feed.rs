//! Feed coordination
//!
//! Owns the team balance mirror and drains the change feed serially. Each
//! batch is applied in full, ranked and published before the next batch is
//! read, so subscribers only ever see views of fully applied batches.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::document::DocumentChange;
use types::errors::StoreError;

use crate::broadcast::Broadcaster;
use crate::mirror::{MirrorEvent, StateMirror};
use crate::ranking;
use crate::store::{FeedMessage, FeedSubscription, StoreClient};

/// Collection mirrored for the team ranking
pub const TEAMS_COLLECTION: &str = "approved_buyers";
/// Field holding a team's balance
pub const BALANCE_FIELD: &str = "balance";

pub struct FeedCoordinator {
    mirror: StateMirror,
    broadcaster: Arc<Broadcaster>,
    field: String,
    batches_applied: u64,
    errors_seen: u64,
}

impl FeedCoordinator {
    pub fn new(broadcaster: Arc<Broadcaster>, field: impl Into<String>) -> Self {
        Self {
            mirror: StateMirror::new(),
            broadcaster,
            field: field.into(),
            batches_applied: 0,
            errors_seen: 0,
        }
    }

    /// Process one feed delivery
    pub fn handle(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Batch(changes) => self.apply_batch(changes),
            FeedMessage::Error(err) => {
                self.errors_seen += 1;
                // Mirror keeps its last known good state
                error!(error = %err, "Error listening to team changes");
            }
        }
    }

    fn apply_batch(&mut self, changes: Vec<DocumentChange>) {
        let field = self.field.as_str();
        let applied = self.mirror.apply_batch(
            changes
                .iter()
                .map(|change| MirrorEvent::from_change(change, field)),
        );
        self.batches_applied += 1;

        let view = ranking::compute(self.mirror.snapshot());
        let delivered = self.broadcaster.publish(view);

        debug!(
            applied,
            teams = self.mirror.len(),
            delivered,
            batch = self.batches_applied,
            "Feed batch applied"
        );
    }

    pub fn mirror(&self) -> &StateMirror {
        &self.mirror
    }

    pub fn batches_applied(&self) -> u64 {
        self.batches_applied
    }

    pub fn errors_seen(&self) -> u64 {
        self.errors_seen
    }

    /// Drain `feed` until it closes or `shutdown` fires
    pub async fn run(mut self, mut feed: FeedSubscription, shutdown: CancellationToken) -> Self {
        info!(collection = feed.collection(), "Mirroring change feed");

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Feed coordinator shutting down");
                    break;
                }
                message = feed.recv() => message,
            };

            match message {
                Some(message) => self.handle(message),
                None => {
                    warn!(collection = feed.collection(), "Change feed closed, mirror no longer updating");
                    break;
                }
            }
        }

        self
    }
}

/// Subscribe to the team balance feed of `store` and mirror it into
/// `broadcaster` on a background task
pub async fn spawn(
    store: &dyn StoreClient,
    broadcaster: Arc<Broadcaster>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<FeedCoordinator>, StoreError> {
    let feed = store.subscribe(TEAMS_COLLECTION).await?;
    let coordinator = FeedCoordinator::new(broadcaster, BALANCE_FIELD);
    Ok(tokio::spawn(coordinator.run(feed, shutdown)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use types::document::{fields_from, Document};
    use types::leaderboard::TeamBalance;
    use types::numeric::Amount;

    fn change(id: &str, balance: i64) -> DocumentChange {
        DocumentChange::added(Document::new(id, fields_from(json!({ "balance": balance }))))
    }

    fn names(teams: &[TeamBalance]) -> Vec<&str> {
        teams.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_batch_publishes_once() {
        let broadcaster = Arc::new(Broadcaster::new(8));
        let mut subscriber = broadcaster.connect();
        subscriber.try_recv().unwrap();

        let mut coordinator = FeedCoordinator::new(Arc::clone(&broadcaster), BALANCE_FIELD);
        coordinator.handle(FeedMessage::Batch(vec![change("A", 10), change("B", 30), change("C", 20)]));

        assert_eq!(names(&broadcaster.latest()), vec!["B", "C", "A"]);
        assert!(subscriber.try_recv().is_some());
        // One publish for the whole batch
        assert!(subscriber.try_recv().is_none());
        assert_eq!(coordinator.batches_applied(), 1);
    }

    #[test]
    fn test_error_keeps_last_good_state() {
        let broadcaster = Arc::new(Broadcaster::new(8));
        let mut coordinator = FeedCoordinator::new(Arc::clone(&broadcaster), BALANCE_FIELD);
        coordinator.handle(FeedMessage::Batch(vec![change("A", 10)]));
        coordinator.handle(FeedMessage::Error(StoreError::Transport("reset".into())));

        assert_eq!(coordinator.errors_seen(), 1);
        assert_eq!(coordinator.mirror().get("A"), Some(&Amount::from(10)));
        assert_eq!(names(&broadcaster.latest()), vec!["A"]);
    }

    #[tokio::test]
    async fn test_run_follows_store_changes() {
        let store = MemoryStore::new();
        store.upsert(TEAMS_COLLECTION, "A", fields_from(json!({"balance": 10})));

        let broadcaster = Arc::new(Broadcaster::new(16));
        let mut subscriber = broadcaster.connect();
        subscriber.recv().await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = spawn(&store, Arc::clone(&broadcaster), shutdown.clone())
            .await
            .unwrap();

        // Initial listing
        let initial = subscriber.recv().await.unwrap();
        assert!(initial.as_str().contains(r#""name":"A""#));

        store.upsert(TEAMS_COLLECTION, "B", fields_from(json!({"balance": 30})));
        let update = subscriber.recv().await.unwrap();
        assert_eq!(
            update.as_str(),
            r#"{"type":"teams","data":[{"name":"B","balance":30},{"name":"A","balance":10}]}"#
        );

        store.remove(TEAMS_COLLECTION, "A");
        let update = subscriber.recv().await.unwrap();
        assert_eq!(
            update.as_str(),
            r#"{"type":"teams","data":[{"name":"B","balance":30}]}"#
        );

        shutdown.cancel();
        let coordinator = handle.await.unwrap();
        assert_eq!(coordinator.batches_applied(), 3);
        assert_eq!(coordinator.mirror().len(), 1);
    }

    #[tokio::test]
    async fn test_run_ends_when_feed_closes() {
        let store = MemoryStore::new();
        let broadcaster = Arc::new(Broadcaster::new(4));
        let handle = spawn(&store, broadcaster, CancellationToken::new())
            .await
            .unwrap();

        store.close_feeds(TEAMS_COLLECTION);
        let coordinator = handle.await.unwrap();
        assert_eq!(coordinator.batches_applied(), 1);
    }
}
