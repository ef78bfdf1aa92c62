use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// JSON error body shared by every handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    /// Failure reported by the hosted service, passed through verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::Invalid(msg) => AppError::Validation(msg),
            StoreError::AlreadyExists(_) => AppError::Conflict(err.to_string()),
            StoreError::Remote(msg) => AppError::Remote(msg),
            StoreError::Database(e) => AppError::Remote(e.to_string()),
            StoreError::Io(_) | StoreError::Serialization(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(format!("Invalid multipart data: {}", err.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    message: None,
                }
            }
            AppError::Remote(detail) => {
                tracing::warn!(error = %detail, "hosted service error");
                ErrorResponse {
                    error: "Remote service error".to_string(),
                    message: Some(detail.clone()),
                }
            }
            other => ErrorResponse {
                error: other.to_string(),
                message: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_404_with_label() {
        let err: AppError = StoreError::NotFound { label: "Blog", id: 9 }.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Blog not found");
    }

    #[test]
    fn test_remote_message_is_kept() {
        let err: AppError = StoreError::Remote("403 Forbidden: quota exceeded".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "403 Forbidden: quota exceeded");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = AppError::Validation("No file uploaded".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "No file uploaded" }));
    }
}
