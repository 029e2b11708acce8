use axum::extract::State;
use std::sync::Arc;

use crate::routes::AppState;

/// Handler for the cache reset endpoint
///
/// Only the server-side caches are cleared; clients keep their own copy
/// until it expires or the client is restarted.
pub async fn reset(State(state): State<Arc<AppState>>) -> &'static str {
    state.recommender.clear_caches().await;
    tracing::info!("Server caches reset");
    "Server caches cleared. Restart the media client to drop its own cached catalogs."
}
