use crate::error::AppError;
use crate::query::QueryError;
use crate::state::AppState;
use axum::{extract::State, Json};
use types::leaderboard::{HangmanScores, TeamBalance};

/// Current team ranking, as last pushed to subscribers
pub async fn get_teams(State(state): State<AppState>) -> Json<Vec<TeamBalance>> {
    Json((*state.broadcaster.latest()).clone())
}

pub async fn get_hangman_scores(
    State(state): State<AppState>,
) -> Result<Json<HangmanScores>, AppError> {
    match state.queries.hangman_scores().await {
        Ok(scores) => Ok(Json(scores)),
        Err(QueryError::Store(err)) => Err(AppError::InternalError(
            anyhow::Error::new(err).context("An error occurred while fetching Hangman scores"),
        )),
        Err(err) => Err(err.into()),
    }
}
