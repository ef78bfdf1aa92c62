/**
 * Authentication Routes
 * Password login issuing a bearer token, and a token check endpoint
 */
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{create_token, verify_password, AdminSession, Capability};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProtectedResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    let auth = &state.config.auth;
    if !verify_password(auth, &payload.password).await? {
        tracing::warn!("Failed admin login attempt");
        return Err(AppError::Unauthorized);
    }

    let token = create_token(auth, &Capability::ALL).map_err(|e| {
        AppError::Internal(format!("Failed to create access token: {}", e))
    })?;

    tracing::info!("Successful admin login");
    Ok(Json(LoginResponse {
        success: true,
        token,
    }))
}

/// GET /api/protected
pub async fn protected(session: AdminSession) -> Json<ProtectedResponse> {
    tracing::debug!(subject = %session.subject, "protected route accessed");
    Json(ProtectedResponse {
        message: "You are authenticated!".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::TEST_PASSWORD;
    use crate::routes::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_login_empty_password_returns_bad_request() {
        let app = TestApp::new().await;
        let (status, _) = app
            .json("POST", "/api/login", json!({ "password": "" }), false)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_wrong_password_returns_unauthorized() {
        let app = TestApp::new().await;
        let (status, body) = app
            .json("POST", "/api/login", json!({ "password": "wrong" }), false)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_login_then_protected() {
        let app = TestApp::new().await;
        let (status, body) = app
            .json("POST", "/api/login", json!({ "password": TEST_PASSWORD }), false)
            .await;
        assert_eq!(status, StatusCode::OK);
        let login: LoginResponse = serde_json::from_value(body).unwrap();
        assert!(login.success);

        let req = axum::http::Request::get("/api/protected")
            .header("authorization", format!("Bearer {}", login.token))
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "You are authenticated!");
    }

    #[tokio::test]
    async fn test_protected_without_token_is_unauthorized() {
        let app = TestApp::new().await;
        let (status, _) = app.get("/api/protected").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
