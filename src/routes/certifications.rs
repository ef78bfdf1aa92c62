/**
 * Certification Routes
 * Certifications are added and removed, never edited.
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::require_text;
use crate::auth::{AdminSession, Capability};
use crate::error::AppResult;
use crate::models::{Certification, NewCertification, RecordId};
use crate::state::AppState;
use crate::store::{Bucket, ListFilter};

/// GET /api/certifications
pub async fn list_certifications(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let certifications = state
        .store
        .certifications
        .list(&ListFilter::default())
        .await?;
    Ok(Json(json!({
        "count": certifications.len(),
        "certifications": certifications,
    })))
}

/// POST /api/certifications
pub async fn create_certification(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<NewCertification>,
) -> AppResult<(StatusCode, Json<Certification>)> {
    session.require(Capability::ManageContent)?;
    require_text("Title", &payload.title)?;

    let certification = state.store.certifications.create(payload).await?;
    Ok((StatusCode::CREATED, Json(certification)))
}

/// DELETE /api/certifications/{id}
///
/// Also removes the attached file when it lives in our own storage.
pub async fn delete_certification(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
) -> AppResult<Json<Certification>> {
    session.require(Capability::ManageContent)?;
    let certification = state.store.certifications.delete(id).await?;

    let objects = &state.store.objects;
    if let Some(key) = certification
        .file_url
        .as_deref()
        .and_then(|url| objects.key_from_url(Bucket::Media, url))
    {
        if let Err(e) = objects.delete(Bucket::Media, &key).await {
            tracing::warn!(id, key = %key, error = %e, "Failed to remove certification file");
        }
    }

    Ok(Json(certification))
}
