/**
 * Visit Routes
 * Page-load counter, daily counts and visitor locations
 */
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{AdminSession, Capability};
use crate::error::AppResult;
use crate::models::{DailyVisit, VisitorLocation};
use crate::state::AppState;
use crate::tracking::{client_ip, VisitStats, RECENT_LOCATIONS};

#[derive(Debug, Deserialize, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// POST /api/visits
pub async fn record_visit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> AppResult<Json<CountResponse>> {
    let ip = client_ip(&headers, Some(addr));
    let today = Utc::now().date_naive();
    let count = state.tracker.record_visit(&ip, today).await?;
    Ok(Json(CountResponse { count }))
}

/// GET /api/visits
pub async fn get_visits(State(state): State<AppState>) -> AppResult<Json<CountResponse>> {
    let count = state.store.visits.total().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /api/visits/daily
pub async fn get_daily(State(state): State<AppState>) -> AppResult<Json<Vec<DailyVisit>>> {
    Ok(Json(state.store.visits.daily().await?))
}

/// GET /api/visits/locations - latest 20
pub async fn get_locations(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<Vec<VisitorLocation>>> {
    session.require(Capability::ViewAnalytics)?;
    Ok(Json(state.store.visits.locations(RECENT_LOCATIONS).await?))
}

/// GET /api/visits/stats
pub async fn get_stats(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<VisitStats>> {
    session.require(Capability::ViewAnalytics)?;
    Ok(Json(state.tracker.stats().await?))
}
