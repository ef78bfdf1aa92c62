//! Content models - records shared by both storage backends.
//!
//! Field names double as JSON keys in the flat files and as column names in
//! the hosted tables, so a record serializes the same way on both paths.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

pub type RecordId = i64;

/// Patch semantics for nullable fields: absent leaves the value alone,
/// `null` clears it, anything else replaces it.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// A record type persisted in its own collection (JSON file or table).
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    /// Payload accepted when creating a record.
    type New: Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Partial update; absent fields leave the record unchanged.
    type Patch: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// File stem and table name.
    const COLLECTION: &'static str;
    /// Human label used in "not found" messages.
    const LABEL: &'static str;
    /// Persisted fields other than `id`, in table column order.
    const FIELDS: &'static [&'static str];
    /// SQL ordering used by the hosted listing.
    const ORDER_BY: &'static str;
    /// Column holding the category, if the entity has one.
    const CATEGORY_FIELD: Option<&'static str> = None;

    fn id(&self) -> RecordId;

    fn build(id: RecordId, new: Self::New, now: DateTime<Utc>) -> Self;

    fn apply(&mut self, patch: Self::Patch, now: DateTime<Utc>);

    fn category(&self) -> Option<&str> {
        None
    }

    /// Order records the same way `ORDER_BY` does.
    fn sort(records: &mut [Self]);
}

// ============================================================================
// Blog posts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlog {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlogPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<Option<String>>,
}

impl Entity for Blog {
    type New = NewBlog;
    type Patch = BlogPatch;

    const COLLECTION: &'static str = "blogs";
    const LABEL: &'static str = "Blog";
    const FIELDS: &'static [&'static str] =
        &["title", "content", "image_url", "created_at", "updated_at"];
    const ORDER_BY: &'static str = "created_at DESC, id DESC";

    fn id(&self) -> RecordId {
        self.id
    }

    fn build(id: RecordId, new: NewBlog, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            content: new.content,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, patch: BlogPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(image_url) = patch.image_url {
            self.image_url = image_url;
        }
        self.updated_at = now;
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }
}

// ============================================================================
// Projects
// ============================================================================

pub const DEFAULT_PROJECT_CATEGORY: &str = "Web Development";

/// Project categories that belong to the photography showcase rather than
/// the tech project list.
pub const PHOTOGRAPHY_CATEGORIES: &[&str] = &["Photography", "Image Artistry", "image-artistry"];

fn default_project_category() -> String {
    DEFAULT_PROJECT_CATEGORY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_project_category")]
    pub category: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_project_category")]
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub client: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub link: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Entity for Project {
    type New = NewProject;
    type Patch = ProjectPatch;

    const COLLECTION: &'static str = "projects";
    const LABEL: &'static str = "Project";
    const FIELDS: &'static [&'static str] = &[
        "title",
        "description",
        "client",
        "duration",
        "link",
        "image_url",
        "category",
        "created_at",
    ];
    const ORDER_BY: &'static str = "created_at DESC, id DESC";
    const CATEGORY_FIELD: Option<&'static str> = Some("category");

    fn id(&self) -> RecordId {
        self.id
    }

    fn build(id: RecordId, new: NewProject, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            description: new.description,
            client: new.client,
            duration: new.duration,
            link: new.link,
            image_url: new.image_url,
            category: new.category,
            created_at: now,
        }
    }

    fn apply(&mut self, patch: ProjectPatch, _now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(client) = patch.client {
            self.client = client;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(link) = patch.link {
            self.link = link;
        }
        if let Some(image_url) = patch.image_url {
            self.image_url = image_url;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }
}

// ============================================================================
// Skills
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: RecordId,
    pub name: String,
    pub category: String,
    /// 0-100
    pub proficiency: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSkill {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub proficiency: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proficiency: Option<i32>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon: Option<Option<String>>,
}

impl Entity for Skill {
    type New = NewSkill;
    type Patch = SkillPatch;

    const COLLECTION: &'static str = "skills";
    const LABEL: &'static str = "Skill";
    const FIELDS: &'static [&'static str] =
        &["name", "category", "proficiency", "description", "icon"];
    const ORDER_BY: &'static str = "category ASC, name ASC";
    const CATEGORY_FIELD: Option<&'static str> = Some("category");

    fn id(&self) -> RecordId {
        self.id
    }

    fn build(id: RecordId, new: NewSkill, _now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            category: new.category,
            proficiency: new.proficiency,
            description: new.description,
            icon: new.icon,
        }
    }

    fn apply(&mut self, patch: SkillPatch, _now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(proficiency) = patch.proficiency {
            self.proficiency = proficiency;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
    }
}

pub fn is_valid_proficiency(value: i32) -> bool {
    (0..=100).contains(&value)
}

// ============================================================================
// Media
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: RecordId,
    pub file_name: String,
    pub file_url: String,
    pub category: String,
    #[serde(default)]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaItem {
    pub file_name: String,
    pub file_url: String,
    pub category: String,
}

/// Media records are replaced, not edited; only the category can move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Entity for MediaItem {
    type New = NewMediaItem;
    type Patch = MediaPatch;

    const COLLECTION: &'static str = "media";
    const LABEL: &'static str = "Media item";
    const FIELDS: &'static [&'static str] = &["file_name", "file_url", "category", "uploaded_at"];
    const ORDER_BY: &'static str = "uploaded_at DESC, id DESC";
    const CATEGORY_FIELD: Option<&'static str> = Some("category");

    fn id(&self) -> RecordId {
        self.id
    }

    fn build(id: RecordId, new: NewMediaItem, now: DateTime<Utc>) -> Self {
        Self {
            id,
            file_name: new.file_name,
            file_url: new.file_url,
            category: new.category,
            uploaded_at: now,
        }
    }

    fn apply(&mut self, patch: MediaPatch, _now: DateTime<Utc>) {
        if let Some(category) = patch.category {
            self.category = category;
        }
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
    }
}

// ============================================================================
// Certifications
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub id: RecordId,
    pub title: String,
    pub issuer: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCertification {
    pub title: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// Certifications have no edit form; the HTTP layer exposes no update route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificationPatch {
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_url: Option<Option<String>>,
}

impl Entity for Certification {
    type New = NewCertification;
    type Patch = CertificationPatch;

    const COLLECTION: &'static str = "certifications";
    const LABEL: &'static str = "Certification";
    const FIELDS: &'static [&'static str] = &["title", "issuer", "date", "file_url"];
    const ORDER_BY: &'static str = "date DESC NULLS LAST, id DESC";

    fn id(&self) -> RecordId {
        self.id
    }

    fn build(id: RecordId, new: NewCertification, _now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            issuer: new.issuer,
            date: new.date,
            file_url: new.file_url,
        }
    }

    fn apply(&mut self, patch: CertificationPatch, _now: DateTime<Utc>) {
        if let Some(file_url) = patch.file_url {
            self.file_url = file_url;
        }
    }

    fn sort(records: &mut [Self]) {
        // None sorts after any date, matching NULLS LAST.
        records.sort_by(|a, b| match (a.date, b.date) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });
    }
}

// ============================================================================
// Visits
// ============================================================================

/// Global page-load counter (`visits.json`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitCount {
    #[serde(default)]
    pub count: u64,
}

/// One calendar day's page loads; at most one per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVisit {
    pub date: NaiveDate,
    pub count: u64,
}

/// Approximate origin of a page load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorLocation {
    pub ip: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl VisitorLocation {
    pub fn new(ip: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            ip: ip.into(),
            date,
            country: None,
            region: None,
            city: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
