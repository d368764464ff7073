use crate::error::AppError;
use crate::query::QueryError;
use crate::state::AppState;
use axum::{extract::State, Json};
use types::leaderboard::Item;

pub async fn get_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, AppError> {
    match state.queries.items().await {
        Ok(items) => Ok(Json(items)),
        Err(QueryError::Store(err)) => Err(AppError::InternalError(
            anyhow::Error::new(err).context("An error occurred while fetching items"),
        )),
        Err(err) => Err(err.into()),
    }
}
