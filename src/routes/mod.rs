/**
 * Routes Module
 * API route handlers
 */
pub mod auth;
pub mod blogs;
pub mod certifications;
pub mod health;
pub mod media;
pub mod projects;
pub mod skills;
pub mod stats;
pub mod upload;
pub mod visits;

use crate::error::AppError;

/// Reject blank required text fields.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Same check for a field that is only validated when present.
pub(crate) fn require_text_if_set(field: &str, value: Option<&str>) -> Result<(), AppError> {
    match value {
        Some(v) => require_text(field, v),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{net::SocketAddr, sync::Arc};

    use axum::{
        body::Body,
        extract::connect_info::MockConnectInfo,
        http::{Request, StatusCode},
        Router,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::auth::{create_token, Capability};
    use crate::config::testing as config_testing;
    use crate::state::AppState;
    use crate::store::ContentStore;
    use crate::tracking::testing::FakeLocator;

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
        pub locator: Arc<FakeLocator>,
        pub dir: TempDir,
    }

    impl TestApp {
        pub async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = config_testing::config(dir.path());
            let store = ContentStore::local(&config.storage).await.unwrap();
            let locator = Arc::new(FakeLocator::default());
            let state = AppState::new(config, store, locator.clone());
            let router = crate::create_app(state.clone())
                .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))));
            Self {
                router,
                state,
                locator,
                dir,
            }
        }

        pub fn token(&self) -> String {
            self.token_with(&Capability::ALL)
        }

        pub fn token_with(&self, capabilities: &[Capability]) -> String {
            create_token(&self.state.config.auth, capabilities).unwrap()
        }

        pub async fn send(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
            let res = self.router.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
            };
            (status, body)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        pub async fn get_authed(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            let req = Request::get(uri)
                .header("authorization", format!("Bearer {}", self.token()))
                .body(Body::empty())
                .unwrap();
            self.send(req).await
        }

        pub async fn json(
            &self,
            method: &str,
            uri: &str,
            body: serde_json::Value,
            authed: bool,
        ) -> (StatusCode, serde_json::Value) {
            let mut req = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            if authed {
                req = req.header("authorization", format!("Bearer {}", self.token()));
            }
            self.send(req.body(Body::from(body.to_string())).unwrap())
                .await
        }

        pub async fn delete(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            let req = Request::delete(uri)
                .header("authorization", format!("Bearer {}", self.token()))
                .body(Body::empty())
                .unwrap();
            self.send(req).await
        }

        /// Multipart upload with a `file` part and optional text fields.
        pub async fn upload(
            &self,
            uri: &str,
            file_name: &str,
            bytes: &[u8],
            fields: &[(&str, &str)],
        ) -> (StatusCode, serde_json::Value) {
            let boundary = "X-PORTFOLIO-TEST-BOUNDARY";
            let mut body = Vec::new();
            for (name, value) in fields {
                body.extend_from_slice(
                    format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    )
                    .as_bytes(),
                );
            }
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

            let req = Request::post(uri)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .header("authorization", format!("Bearer {}", self.token()))
                .body(Body::from(body))
                .unwrap();
            self.send(req).await
        }
    }
}
