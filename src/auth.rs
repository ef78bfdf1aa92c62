//! Admin sessions: HS256 tokens issued at login and checked per request.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

pub const ADMIN_SUBJECT: &str = "admin";

/// What an authenticated caller may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create, edit and delete content; upload files.
    ManageContent,
    /// Read visitor locations and analytics.
    ViewAnalytics,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::ManageContent, Capability::ViewAnalytics];
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub capabilities: Vec<Capability>,
    pub exp: i64,
    pub iat: i64,
}

pub fn create_token(
    config: &AuthConfig,
    capabilities: &[Capability],
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(config.token_ttl_hours);

    let claims = Claims {
        sub: ADMIN_SUBJECT.to_string(),
        capabilities: capabilities.to_vec(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Check `password` against the configured admin hash. bcrypt is slow on
/// purpose, so the comparison runs on the blocking pool.
pub async fn verify_password(config: &AuthConfig, password: &str) -> Result<bool, AppError> {
    let Some(hashed) = config.admin_password_hash.clone() else {
        return Ok(false);
    };
    let password = password.to_string();

    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed)).await {
        Ok(Ok(valid)) => Ok(valid),
        Ok(Err(e)) => {
            tracing::error!("Password verification failed: {}", e);
            Ok(false)
        }
        Err(e) => Err(AppError::Internal(format!("password check task failed: {}", e))),
    }
}

/// Authenticated admin, extracted from `Authorization: Bearer <token>`.
///
/// Taking this as a handler argument requires a valid token; capability
/// checks happen through [`AdminSession::require`].
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub subject: String,
    pub capabilities: Vec<Capability>,
}

impl AdminSession {
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.can(capability) {
            Ok(())
        } else {
            tracing::warn!(subject = %self.subject, ?capability, "capability denied");
            Err(AppError::Forbidden)
        }
    }
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let claims = verify_token(&state.config.auth, token).map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            AppError::Unauthorized
        })?;

        Ok(AdminSession {
            subject: claims.sub,
            capabilities: claims.capabilities,
        })
    }
}
