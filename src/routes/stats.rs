use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::state::AppState;
use crate::store::ListFilter;

/// Dashboard overview counters.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub blogs: usize,
    pub projects: usize,
    pub media: usize,
    pub visits: u64,
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let store = &state.store;
    let all = ListFilter::default();

    let (blogs, projects, media, visits) = tokio::try_join!(
        store.blogs.list(&all),
        store.projects.list(&all),
        store.media.list(&all),
        store.visits.total(),
    )?;

    Ok(Json(StatsResponse {
        blogs: blogs.len(),
        projects: projects.len(),
        media: media.len(),
        visits,
    }))
}
