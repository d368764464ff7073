use crate::broadcast::Broadcaster;
use crate::query::QueryService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<Broadcaster>,
    pub queries: Arc<QueryService>,
    /// Cancelled at process shutdown; open push connections end on it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        queries: QueryService,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broadcaster,
            queries: Arc::new(queries),
            shutdown,
        }
    }
}
