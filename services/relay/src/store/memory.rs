//! In-process document store
//!
//! Holds collections in memory and pushes every mutation made through its
//! API to live subscribers as a feed batch. Used by the `memory` backend and
//! throughout the tests, where `fail_with` simulates an unreachable store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;
use types::document::{ChangeKind, Document, DocumentChange, Fields};
use types::errors::StoreError;

use super::{FeedMessage, FeedSender, FeedSubscription, StoreClient};

#[derive(Default)]
struct Inner {
    /// Documents per collection, enumerated in id order
    collections: HashMap<String, BTreeMap<String, Fields>>,
    subscribers: HashMap<String, Vec<FeedSender>>,
    failure: Option<String>,
}

impl Inner {
    fn notify(&mut self, collection: &str, message: FeedMessage) {
        if let Some(senders) = self.subscribers.get_mut(collection) {
            senders.retain(|sender| sender.send(message.clone()).is_ok());
        }
    }

    /// Store the changes and hand them to subscribers as one batch
    fn commit(&mut self, collection: &str, changes: Vec<DocumentChange>) {
        let docs = self.collections.entry(collection.to_string()).or_default();
        for change in &changes {
            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    docs.insert(change.id.clone(), change.data.clone());
                }
                ChangeKind::Removed => {
                    docs.remove(&change.id);
                }
            }
        }
        debug!(collection, changes = changes.len(), "Memory store batch applied");
        self.notify(collection, FeedMessage::Batch(changes));
    }
}

/// Memory-backed `StoreClient`
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a document, notifying subscribers
    pub fn upsert(&self, collection: &str, id: &str, data: Fields) {
        let mut inner = self.lock();
        let exists = inner
            .collections
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id));
        let doc = Document::new(id, data);
        let change = if exists {
            DocumentChange::modified(doc)
        } else {
            DocumentChange::added(doc)
        };
        inner.commit(collection, vec![change]);
    }

    /// Delete a document, notifying subscribers. Absent ids are ignored.
    pub fn remove(&self, collection: &str, id: &str) {
        let mut inner = self.lock();
        let data = inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned());

        if let Some(data) = data {
            inner.commit(
                collection,
                vec![DocumentChange::removed(Document::new(id, data))],
            );
        }
    }

    /// Apply several changes as one remote change: subscribers receive them
    /// in a single batch
    pub fn apply_batch(&self, collection: &str, changes: Vec<DocumentChange>) {
        self.lock().commit(collection, changes);
    }

    /// Deliver an error on every feed of `collection`
    pub fn emit_error(&self, collection: &str, error: StoreError) {
        self.lock().notify(collection, FeedMessage::Error(error));
    }

    /// Make every subsequent point query fail with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.lock().failure = Some(reason.into());
    }

    /// Undo `fail_with`
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Drop every feed of `collection`, as a store shutting down would
    pub fn close_feeds(&self, collection: &str) {
        self.lock().subscribers.remove(collection);
    }

    /// Number of live feeds on `collection`
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.lock()
            .subscribers
            .get(collection)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn query_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock();
        if let Some(reason) = &inner.failure {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        Ok(inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subscribe(&self, collection: &str) -> Result<FeedSubscription, StoreError> {
        let mut inner = self.lock();
        if let Some(reason) = &inner.failure {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        let (sender, subscription) = FeedSubscription::channel(collection);

        let initial: Vec<DocumentChange> = inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| DocumentChange::added(Document::new(id.clone(), data.clone())))
                    .collect()
            })
            .unwrap_or_default();

        // Receiver is alive, the send cannot fail
        let _ = sender.send(FeedMessage::Batch(initial));

        inner
            .subscribers
            .entry(collection.to_string())
            .or_default()
            .push(sender);

        Ok(subscription)
    }
}
