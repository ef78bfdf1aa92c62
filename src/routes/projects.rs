/**
 * Project Routes
 * CRUD API endpoints for portfolio projects
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{require_text, require_text_if_set};
use crate::auth::{AdminSession, Capability};
use crate::error::AppResult;
use crate::models::{NewProject, Project, ProjectPatch, RecordId, PHOTOGRAPHY_CATEGORIES};
use crate::state::AppState;
use crate::store::ListFilter;

/// Query parameters for GET /api/projects
#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub category: Option<String>,
    /// Comma separated categories to leave out.
    pub exclude: Option<String>,
    /// `tech` hides the photography showcase categories.
    pub view: Option<String>,
}

impl ProjectListQuery {
    fn into_filter(self) -> ListFilter {
        let mut exclude: Vec<String> = self
            .exclude
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        if self.view.as_deref() == Some("tech") {
            exclude.extend(PHOTOGRAPHY_CATEGORIES.iter().map(|c| c.to_string()));
        }
        ListFilter {
            category: self.category.filter(|c| !c.trim().is_empty()),
            exclude_categories: exclude,
            limit: None,
        }
    }
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Value>> {
    let projects = state.store.projects.list(&query.into_filter()).await?;
    Ok(Json(json!({ "count": projects.len(), "projects": projects })))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<NewProject>,
) -> AppResult<(StatusCode, Json<Project>)> {
    session.require(Capability::ManageContent)?;
    require_text("Title", &payload.title)?;

    let project = state.store.projects.create(payload).await?;
    tracing::info!(id = project.id, category = %project.category, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// PUT /api/projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
    Json(patch): Json<ProjectPatch>,
) -> AppResult<Json<Project>> {
    session.require(Capability::ManageContent)?;
    require_text_if_set("Title", patch.title.as_deref())?;

    Ok(Json(state.store.projects.update(id, patch).await?))
}

/// DELETE /api/projects/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
) -> AppResult<Json<Project>> {
    session.require(Capability::ManageContent)?;
    let project = state.store.projects.delete(id).await?;
    tracing::info!(id, "Project deleted");
    Ok(Json(project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;

    #[test]
    fn test_tech_view_excludes_photography() {
        let filter = ProjectListQuery {
            exclude: Some("Other, ".into()),
            view: Some("tech".into()),
            ..Default::default()
        }
        .into_filter();
        assert!(filter.exclude_categories.contains(&"Other".to_string()));
        assert!(filter.exclude_categories.contains(&"Photography".to_string()));
        assert!(filter.exclude_categories.contains(&"Image Artistry".to_string()));
        assert_eq!(filter.category, None);
    }

    #[tokio::test]
    async fn test_list_filters_by_view_and_category() {
        let app = TestApp::new().await;
        for (title, category) in [
            ("Site", "Web Development"),
            ("Sunset", "Photography"),
            ("Collage", "Image Artistry"),
        ] {
            let (status, _) = app
                .json(
                    "POST",
                    "/api/projects",
                    json!({ "title": title, "category": category }),
                    true,
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, all) = app.get("/api/projects").await;
        assert_eq!(all["count"], 3);

        let (_, tech) = app.get("/api/projects?view=tech").await;
        assert_eq!(tech["count"], 1);
        assert_eq!(tech["projects"][0]["title"], "Site");

        let (_, photos) = app.get("/api/projects?category=Photography").await;
        assert_eq!(photos["count"], 1);
        assert_eq!(photos["projects"][0]["title"], "Sunset");
    }

    #[tokio::test]
    async fn test_update_keeps_unpatched_fields() {
        let app = TestApp::new().await;
        let (_, created) = app
            .json(
                "POST",
                "/api/projects",
                json!({ "title": "Site", "client": "ACME", "link": "https://a.example" }),
                true,
            )
            .await;
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["category"], "Web Development");

        let (status, updated) = app
            .json("PUT", &format!("/api/projects/{id}"), json!({ "client": "Globex" }), true)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["client"], "Globex");
        assert_eq!(updated["link"], "https://a.example");

        let (status, body) = app.delete("/api/projects/1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Project not found");
    }
}
