/**
 * Skill Routes
 */
use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{require_text, require_text_if_set};
use crate::auth::{AdminSession, Capability};
use crate::error::{AppError, AppResult};
use crate::models::{is_valid_proficiency, NewSkill, RecordId, Skill, SkillPatch};
use crate::state::AppState;
use crate::store::ListFilter;

fn check_proficiency(value: i32) -> Result<(), AppError> {
    if !is_valid_proficiency(value) {
        return Err(AppError::Validation(
            "Proficiency must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/skills
pub async fn list_skills(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let skills = state.store.skills.list(&ListFilter::default()).await?;
    Ok(Json(json!({ "count": skills.len(), "skills": skills })))
}

/// GET /api/skills/grouped
pub async fn grouped_skills(
    State(state): State<AppState>,
) -> AppResult<Json<BTreeMap<String, Vec<Skill>>>> {
    let skills = state.store.skills.list(&ListFilter::default()).await?;
    let mut grouped: BTreeMap<String, Vec<Skill>> = BTreeMap::new();
    for skill in skills {
        grouped.entry(skill.category.clone()).or_default().push(skill);
    }
    Ok(Json(grouped))
}

/// POST /api/skills
pub async fn create_skill(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<NewSkill>,
) -> AppResult<(StatusCode, Json<Skill>)> {
    session.require(Capability::ManageContent)?;
    require_text("Name", &payload.name)?;
    require_text("Category", &payload.category)?;
    check_proficiency(payload.proficiency)?;

    let skill = state.store.skills.create(payload).await?;
    Ok((StatusCode::CREATED, Json(skill)))
}

/// PUT /api/skills/{id}
pub async fn update_skill(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
    Json(patch): Json<SkillPatch>,
) -> AppResult<Json<Skill>> {
    session.require(Capability::ManageContent)?;
    require_text_if_set("Name", patch.name.as_deref())?;
    require_text_if_set("Category", patch.category.as_deref())?;
    if let Some(proficiency) = patch.proficiency {
        check_proficiency(proficiency)?;
    }

    Ok(Json(state.store.skills.update(id, patch).await?))
}

/// DELETE /api/skills/{id}
pub async fn delete_skill(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<RecordId>,
) -> AppResult<Json<Skill>> {
    session.require(Capability::ManageContent)?;
    Ok(Json(state.store.skills.delete(id).await?))
}
