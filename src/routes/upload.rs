use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{AdminSession, Capability};
use crate::error::{AppError, AppResult};
use crate::media::put_stamped;
use crate::state::AppState;
use crate::store::Bucket;

/// Folder inside the media bucket that holds certification files.
pub const CERTIFICATIONS_FOLDER: &str = "certifications";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub file_path: String,
}

/// A `file` part plus the optional `category` text field.
#[derive(Debug)]
pub struct UploadForm {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub category: Option<String>,
}

/// Drain the multipart body. A missing or empty `file` part is rejected.
pub async fn read_upload(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut category = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                file = Some((name, bytes.to_vec()));
            }
            Some("category") => {
                category = Some(field.text().await?);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring multipart field");
            }
        }
    }

    match file {
        Some((file_name, bytes)) if !bytes.is_empty() => Ok(UploadForm {
            file_name,
            bytes,
            category,
        }),
        _ => Err(AppError::Validation("No file uploaded".to_string())),
    }
}

async fn store_upload(
    state: &AppState,
    session: &AdminSession,
    multipart: Multipart,
    bucket: Bucket,
    folder: Option<&str>,
    message: &str,
) -> AppResult<Json<UploadResponse>> {
    session.require(Capability::ManageContent)?;
    let form = read_upload(multipart).await?;

    let stored = put_stamped(
        state.store.objects.as_ref(),
        bucket,
        folder,
        &form.file_name,
        &form.bytes,
        Utc::now(),
    )
    .await?;

    tracing::info!(bucket = %bucket, key = %stored.key, size = form.bytes.len(), "Upload stored");
    Ok(Json(UploadResponse {
        message: message.to_string(),
        file_path: stored.url,
    }))
}

/// POST /api/blogs/upload
pub async fn upload_blog_image(
    State(state): State<AppState>,
    session: AdminSession,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    store_upload(&state, &session, multipart, Bucket::BlogImages, None, "Blog image uploaded").await
}

/// POST /api/projects/upload
pub async fn upload_project_image(
    State(state): State<AppState>,
    session: AdminSession,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    store_upload(
        &state,
        &session,
        multipart,
        Bucket::ProjectImages,
        None,
        "Project image uploaded",
    )
    .await
}

/// POST /api/certifications/upload
pub async fn upload_certification_file(
    State(state): State<AppState>,
    session: AdminSession,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    store_upload(
        &state,
        &session,
        multipart,
        Bucket::Media,
        Some(CERTIFICATIONS_FOLDER),
        "Certification file uploaded",
    )
    .await
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::TestApp;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_blog_image_upload_path() {
        let app = TestApp::new().await;
        let (status, body) = app
            .upload("/api/blogs/upload", "cover.png", b"\x89PNG....", &[])
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Blog image uploaded");
        let path = body["filePath"].as_str().unwrap();
        assert!(path.starts_with("/public/blog-images/"));
        assert!(path.ends_with("-cover.png"));

        let stored = app
            .dir
            .path()
            .join("public")
            .join(path.trim_start_matches("/public/"));
        assert_eq!(std::fs::read(stored).unwrap(), b"\x89PNG....");
    }

    #[tokio::test]
    async fn test_project_upload_without_file_is_rejected() {
        let app = TestApp::new().await;
        let (status, body) = app
            .upload("/api/projects/upload", "empty.png", b"", &[])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_project_upload_path() {
        let app = TestApp::new().await;
        let (status, body) = app
            .upload("/api/projects/upload", "shot.jpg", b"jpeg", &[])
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["filePath"]
            .as_str()
            .unwrap()
            .starts_with("/public/project-images/"));
    }
}
