//! Remote document store access
//!
//! The relay consumes two capabilities from a store: a point query returning
//! every document of a collection, and a live change feed delivering one
//! batch of document changes per remote change.
//!
//! Feed deliveries travel over a channel so the consumer drains them
//! serially, one batch at a time, in the order the store produced them.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;
use types::document::{Document, DocumentChange};
use types::errors::StoreError;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// A single delivery on a change feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// All changes produced by one remote change, in order
    Batch(Vec<DocumentChange>),
    /// Delivery failure reported by the store client
    Error(StoreError),
}

/// Sending half of a feed, held by the store client
pub type FeedSender = mpsc::UnboundedSender<FeedMessage>;

/// Receiving half of a change feed
///
/// Dropping the subscription unsubscribes: the store client notices the
/// closed channel and stops producing.
#[derive(Debug)]
pub struct FeedSubscription {
    collection: String,
    receiver: mpsc::UnboundedReceiver<FeedMessage>,
}

impl FeedSubscription {
    /// Create a connected sender/subscription pair for a collection
    pub fn channel(collection: impl Into<String>) -> (FeedSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            sender,
            Self {
                collection: collection.into(),
                receiver,
            },
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next delivery, or `None` once the store client has dropped the feed
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.receiver.recv().await
    }
}

/// Abstract access to a remote document collection store
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetch every document currently in `collection`
    async fn query_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Subscribe to live changes of `collection`
    ///
    /// The first batch describes the whole collection as `added` changes.
    async fn subscribe(&self, collection: &str) -> Result<FeedSubscription, StoreError>;
}
