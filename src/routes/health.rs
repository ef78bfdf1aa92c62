/**
 * Health Routes
 * Liveness ping and a detailed check of the content store
 */
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Single service check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detailed health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub backend: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub storage: ServiceCheck,
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// GET /health
pub async fn health_ping() -> Json<SimpleHealthResponse> {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/detailed
///
/// Always 200 so the dashboard can tell a running server apart from a dead
/// one; the overall status reports whether storage answered.
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let storage = match state.store.health().await {
        Ok(duration) => ServiceCheck {
            status: "healthy".to_string(),
            response_time: Some(duration.as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            ServiceCheck {
                status: "unhealthy".to_string(),
                response_time: None,
                error: Some(e.to_string()),
            }
        }
    };

    let status = if storage.status == "healthy" { "ok" } else { "degraded" };

    Json(DetailedHealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        uptime: state.uptime_secs(),
        backend: state.store.backend().as_str().to_string(),
        checks: HealthChecks { storage },
    })
}
