//! Wiring of stores, live sync and the HTTP surface

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use types::errors::StoreError;

use crate::broadcast::Broadcaster;
use crate::config::{Config, StoreBackend};
use crate::feed::{self, FeedCoordinator};
use crate::query::QueryService;
use crate::state::AppState;
use crate::store::{FirestoreStore, MemoryStore, StoreClient};

/// The two independently configured store instances
#[derive(Clone)]
pub struct Stores {
    /// Team balances and items
    pub primary: Arc<dyn StoreClient>,
    /// Hangman scores
    pub hangman: Arc<dyn StoreClient>,
}

impl Stores {
    pub fn from_config(config: &Config, shutdown: &CancellationToken) -> Result<Self, StoreError> {
        match config.backend {
            StoreBackend::Firestore => Ok(Self {
                primary: Arc::new(FirestoreStore::new(
                    "primary",
                    &config.primary,
                    &config.firestore,
                    shutdown.clone(),
                )?),
                hangman: Arc::new(FirestoreStore::new(
                    "hangman",
                    &config.hangman,
                    &config.firestore,
                    shutdown.clone(),
                )?),
            }),
            StoreBackend::Memory => {
                info!("Using in-memory stores");
                Ok(Self {
                    primary: Arc::new(MemoryStore::new()),
                    hangman: Arc::new(MemoryStore::new()),
                })
            }
        }
    }
}

/// Start mirroring the primary store and build the shared handler state.
///
/// The returned task ends on `shutdown` or when the feed closes.
pub async fn build_state(
    stores: Stores,
    connection_buffer: usize,
    shutdown: CancellationToken,
) -> Result<(AppState, JoinHandle<FeedCoordinator>), StoreError> {
    let broadcaster = Arc::new(Broadcaster::new(connection_buffer));
    let feed_task = feed::spawn(
        stores.primary.as_ref(),
        Arc::clone(&broadcaster),
        shutdown.clone(),
    )
    .await?;

    let queries = QueryService::new(stores.primary, stores.hangman);
    Ok((AppState::new(broadcaster, queries, shutdown), feed_task))
}
