//! On-demand snapshot queries
//!
//! Each call goes straight to the store for fresh data; the live mirror is
//! never consulted.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use types::document::Document;
use types::errors::StoreError;
use types::leaderboard::{HangmanScores, Item, LeaderboardEntry, PodiumEntry, ScoreValue};
use types::numeric::is_truthy;

use crate::store::StoreClient;

/// Item catalogue collection in the primary store
pub const ITEMS_COLLECTION: &str = "items";
/// Team collection in the hangman store
pub const HANGMAN_TEAMS_COLLECTION: &str = "teams";
/// Entries shown without a place number
pub const PODIUM_SIZE: usize = 3;

const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    NotFound(String),

    #[error("Store query failed: {0}")]
    Store(#[from] StoreError),
}

pub struct QueryService {
    primary: Arc<dyn StoreClient>,
    hangman: Arc<dyn StoreClient>,
}

impl QueryService {
    pub fn new(primary: Arc<dyn StoreClient>, hangman: Arc<dyn StoreClient>) -> Self {
        Self { primary, hangman }
    }

    /// Every item with quantity and price, in store order
    pub async fn items(&self) -> Result<Vec<Item>, QueryError> {
        let documents = self.primary.query_all(ITEMS_COLLECTION).await?;
        debug!(count = documents.len(), "Fetched items");
        Ok(shape_items(documents))
    }

    /// Hangman leaderboard split into podium and the rest
    pub async fn hangman_scores(&self) -> Result<HangmanScores, QueryError> {
        let documents = self.hangman.query_all(HANGMAN_TEAMS_COLLECTION).await?;
        debug!(count = documents.len(), "Fetched hangman teams");
        shape_hangman(documents)
            .ok_or_else(|| QueryError::NotFound("No teams found in the database.".to_string()))
    }
}

/// Stored value, or 0 when the field is unset
fn value_or_zero(doc: &Document, field: &str) -> Value {
    doc.field(field)
        .filter(|value| is_truthy(value))
        .cloned()
        .unwrap_or_else(|| Value::from(0))
}

/// Display name of a hangman team
fn team_name(doc: &Document) -> String {
    match doc.field("name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        Some(other) if is_truthy(other) => other.to_string(),
        _ => UNKNOWN_NAME.to_string(),
    }
}

/// Quantity and price pass through as stored; unset fields become 0
pub fn shape_items(documents: Vec<Document>) -> Vec<Item> {
    documents
        .into_iter()
        .map(|doc| Item {
            quantity: value_or_zero(&doc, "quantity"),
            price: value_or_zero(&doc, "price"),
            name: doc.id,
        })
        .collect()
}

/// `None` when there are no documents at all
pub fn shape_hangman(documents: Vec<Document>) -> Option<HangmanScores> {
    if documents.is_empty() {
        return None;
    }

    let mut scored: Vec<(String, ScoreValue)> = documents
        .iter()
        .map(|doc| {
            let score = ScoreValue::from(doc.field("score"));
            (team_name(doc), score)
        })
        .collect();

    // Stable: equal scores keep store order
    scored.sort_by(|a, b| b.1.sort_key().total_cmp(&a.1.sort_key()));

    let rest = scored.split_off(scored.len().min(PODIUM_SIZE));
    let top3 = scored
        .into_iter()
        .map(|(name, score)| PodiumEntry { name, score })
        .collect();
    let leaderboard = rest
        .into_iter()
        .enumerate()
        .map(|(index, (name, score))| LeaderboardEntry {
            place: index + PODIUM_SIZE + 1,
            name,
            score,
        })
        .collect();

    Some(HangmanScores { top3, leaderboard })
}
