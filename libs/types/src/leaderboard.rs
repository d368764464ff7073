//! Client-facing views
//!
//! These shapes are what subscribers and HTTP callers receive. They are
//! derived from store data and never stored.

use crate::numeric::{coerce_f64, Amount};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Marker rendered in place of a missing score
pub const SCORE_UNAVAILABLE: &str = "N/A";

/// One row of the team balance ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamBalance {
    pub name: String,
    pub balance: Amount,
}

/// One row of the item snapshot. Stored values are passed through as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub name: String,
    pub quantity: Value,
    pub price: Value,
}

/// A hangman score as stored, or the "unavailable" marker when the record
/// has none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreValue {
    Recorded(Value),
    Unavailable,
}

impl ScoreValue {
    /// Value used when ordering the leaderboard. Numeric strings count by
    /// their number; missing or unreadable scores count as 0.
    pub fn sort_key(&self) -> f64 {
        match self {
            ScoreValue::Recorded(value) => coerce_f64(value),
            ScoreValue::Unavailable => 0.0,
        }
    }
}

/// Absent and null both mean "no score"
impl From<Option<&Value>> for ScoreValue {
    fn from(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => ScoreValue::Unavailable,
            Some(value) => ScoreValue::Recorded(value.clone()),
        }
    }
}

impl From<Amount> for ScoreValue {
    fn from(amount: Amount) -> Self {
        ScoreValue::Recorded(Value::Number(amount.into_number()))
    }
}

impl Serialize for ScoreValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScoreValue::Recorded(value) => value.serialize(serializer),
            ScoreValue::Unavailable => serializer.serialize_str(SCORE_UNAVAILABLE),
        }
    }
}

/// Top-three entry: no place number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodiumEntry {
    pub name: String,
    pub score: ScoreValue,
}

/// Entry below the podium, numbered from 4
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub place: usize,
    pub name: String,
    pub score: ScoreValue,
}

/// Response of the hangman score query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HangmanScores {
    pub top3: Vec<PodiumEntry>,
    pub leaderboard: Vec<LeaderboardEntry>,
}
