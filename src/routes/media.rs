/**
 * Media Routes
 * Categorised media uploads and the combined media library
 */
use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::upload::read_upload;
use crate::auth::{AdminSession, Capability};
use crate::error::AppResult;
use crate::media::{
    build_library, category_counts, media_key, public_media_url, put_stamped, LibraryEntry,
    LocalMediaEntry, MediaCategory, LOCAL_MEDIA_FILE,
};
use crate::models::{MediaItem, NewMediaItem, RecordId};
use crate::state::AppState;
use crate::store::{file::JsonFile, Bucket, ListFilter};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadResponse {
    pub message: String,
    pub file_path: String,
    pub media: MediaItem,
}

#[derive(Debug, Deserialize)]
pub struct MediaListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub count: usize,
    pub categories: BTreeMap<String, usize>,
    pub media: Vec<LibraryEntry>,
}

/// POST /api/media/upload
///
/// Stores the file, then records it. When the record cannot be written the
/// stored object is removed again so no unreferenced upload is left behind.
pub async fn upload_media(
    State(state): State<AppState>,
    session: AdminSession,
    multipart: Multipart,
) -> AppResult<Json<MediaUploadResponse>> {
    session.require(Capability::ManageContent)?;
    let form = read_upload(multipart).await?;

    let category = MediaCategory::normalize(form.category.as_deref());
    let objects = state.store.objects.as_ref();
    let stored = put_stamped(
        objects,
        Bucket::Media,
        Some(category.as_str()),
        &form.file_name,
        &form.bytes,
        Utc::now(),
    )
    .await?;
    let key = stored.key;
    let file_url = stored.url;

    let created = state
        .store
        .media
        .create(NewMediaItem {
            file_name: stored.file_name,
            file_url: file_url.clone(),
            category: category.to_string(),
        })
        .await;

    let media = match created {
        Ok(media) => media,
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Media record insert failed, removing upload");
            if let Err(cleanup) = objects.delete(Bucket::Media, &key).await {
                tracing::warn!(key = %key, error = %cleanup, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    tracing::info!(id = media.id, category = %category, "Media uploaded");
    Ok(Json(MediaUploadResponse {
        message: "File uploaded".to_string(),
        file_path: file_url,
        media,
    }))
}

/// GET /api/media/list?category=
pub async fn list_media(
    State(state): State<AppState>,
    Query(query): Query<MediaListQuery>,
) -> AppResult<Json<Vec<String>>> {
    let category = match query.category.as_deref() {
        Some(c) if !c.trim().is_empty() => MediaCategory::normalize(Some(c)),
        _ => MediaCategory::Photography,
    };

    let items = state
        .store
        .media
        .list(&ListFilter::category(category.as_str()))
        .await?;
    let objects = state.store.objects.as_ref();
    Ok(Json(
        items
            .iter()
            .map(|item| public_media_url(item, objects))
            .collect(),
    ))
}

/// GET /api/media
pub async fn count_media(State(state): State<AppState>) -> AppResult<Json<CountResponse>> {
    let items = state.store.media.list(&ListFilter::default()).await?;
    Ok(Json(CountResponse { count: items.len() }))
}

/// DELETE /api/media/{id}
pub async fn delete_media(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
) -> AppResult<Json<MediaItem>> {
    session.require(Capability::ManageContent)?;
    let item = state.store.media.delete(id).await?;

    let objects = &state.store.objects;
    let key = objects
        .key_from_url(Bucket::Media, &item.file_url)
        .unwrap_or_else(|| {
            media_key(MediaCategory::normalize(Some(&item.category)), &item.file_name)
        });
    if let Err(e) = objects.delete(Bucket::Media, &key).await {
        tracing::warn!(id, key = %key, error = %e, "Failed to remove media object");
    }

    tracing::info!(id, "Media deleted");
    Ok(Json(item))
}

/// GET /api/media/library
///
/// Media rows must load; blog, project and local sources are best effort.
pub async fn media_library(State(state): State<AppState>) -> AppResult<Json<LibraryResponse>> {
    let store = &state.store;
    let all = ListFilter::default();

    let media = store.media.list(&all).await?;
    let blogs = store.blogs.list(&all).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Blog images unavailable for media library");
        Vec::new()
    });
    let projects = store.projects.list(&all).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Project images unavailable for media library");
        Vec::new()
    });
    let local: Vec<LocalMediaEntry> =
        JsonFile::new(state.config.storage.data_dir.join(LOCAL_MEDIA_FILE))
            .read()
            .await;

    let entries = build_library(media, blogs, projects, local, store.objects.as_ref());
    Ok(Json(LibraryResponse {
        count: entries.len(),
        categories: category_counts(&entries),
        media: entries,
    }))
}
