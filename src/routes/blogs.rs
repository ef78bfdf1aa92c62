/**
 * Blog Routes
 * CRUD API endpoints for blog posts
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{require_text, require_text_if_set};
use crate::auth::{AdminSession, Capability};
use crate::error::AppResult;
use crate::models::{Blog, BlogPatch, NewBlog, RecordId};
use crate::state::AppState;
use crate::store::ListFilter;

/// GET /api/blogs
pub async fn list_blogs(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let blogs = state.store.blogs.list(&ListFilter::default()).await?;
    Ok(Json(json!({ "count": blogs.len(), "blogs": blogs })))
}

/// POST /api/blogs
pub async fn create_blog(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<NewBlog>,
) -> AppResult<(StatusCode, Json<Blog>)> {
    session.require(Capability::ManageContent)?;
    require_text("Title", &payload.title)?;

    let blog = state.store.blogs.create(payload).await?;
    tracing::info!(id = blog.id, "Blog post created");
    Ok((StatusCode::CREATED, Json(blog)))
}

/// PUT /api/blogs/{id}
pub async fn update_blog(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
    Json(patch): Json<BlogPatch>,
) -> AppResult<Json<Blog>> {
    session.require(Capability::ManageContent)?;
    require_text_if_set("Title", patch.title.as_deref())?;

    let blog = state.store.blogs.update(id, patch).await?;
    tracing::info!(id, "Blog post updated");
    Ok(Json(blog))
}

/// DELETE /api/blogs/{id}
pub async fn delete_blog(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
) -> AppResult<Json<Blog>> {
    session.require(Capability::ManageContent)?;
    let blog = state.store.blogs.delete(id).await?;
    tracing::info!(id, "Blog post deleted");
    Ok(Json(blog))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_blog_crud_round() {
        let app = TestApp::new().await;

        let (status, created) = app
            .json(
                "POST",
                "/api/blogs",
                json!({ "title": "Hello", "content": "First post" }),
                true,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, updated) = app
            .json("PUT", &format!("/api/blogs/{id}"), json!({ "title": "Hello again" }), true)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Hello again");
        assert_eq!(updated["content"], "First post");

        let (_, list) = app.get("/api/blogs").await;
        assert_eq!(list["count"], 1);
        assert_eq!(list["blogs"][0]["title"], "Hello again");

        let (status, deleted) = app.delete(&format!("/api/blogs/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["id"], id);

        let (_, list) = app.get("/api/blogs").await;
        assert_eq!(list["count"], 0);
    }

    #[tokio::test]
    async fn test_missing_blog_is_not_found() {
        let app = TestApp::new().await;
        let (status, body) = app
            .json("PUT", "/api/blogs/12345", json!({ "title": "x" }), true)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Blog not found");

        let (status, _) = app.delete("/api/blogs/12345").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_session_and_title() {
        let app = TestApp::new().await;
        let (status, _) = app
            .json("POST", "/api/blogs", json!({ "title": "Hi" }), false)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .json("POST", "/api/blogs", json!({ "title": "  " }), true)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
