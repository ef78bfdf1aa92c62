//! Media categories, upload naming and the combined media library.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Blog, MediaItem, Project, RecordId};
use crate::store::{Bucket, ObjectStore, StoreError};

/// Fallback list kept next to the collection files.
pub const LOCAL_MEDIA_FILE: &str = "local_media.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaCategory {
    Photography,
    #[serde(rename = "image-artistry")]
    ImageArtistry,
    Web,
    Other,
}

impl MediaCategory {
    pub const DEFAULT: MediaCategory = MediaCategory::ImageArtistry;

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Photography => "Photography",
            MediaCategory::ImageArtistry => "image-artistry",
            MediaCategory::Web => "Web",
            MediaCategory::Other => "Other",
        }
    }

    /// Canonical category for free-text input. Case and separator variants
    /// ("Image Artistry", "image_artistry") land on the same value; anything
    /// unrecognised falls back to [`MediaCategory::DEFAULT`].
    pub fn normalize(input: Option<&str>) -> MediaCategory {
        match input.map(fold).as_deref() {
            Some("photography") => MediaCategory::Photography,
            Some("image-artistry") => MediaCategory::ImageArtistry,
            Some("web") => MediaCategory::Web,
            Some("other") => MediaCategory::Other,
            _ => MediaCategory::DEFAULT,
        }
    }
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase and collapse whitespace, `_` and `-` runs into a single `-`.
fn fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;
    for c in input.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('-');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Client-supplied file name reduced to its last path component.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    let base = base.trim();
    if base.is_empty() || base == "." || base == ".." {
        "file".to_string()
    } else {
        base.to_string()
    }
}

/// How far the stamp may move forward looking for a free name.
const STAMP_ATTEMPTS: i64 = 32;

/// `<millis>-<name>`.
pub fn stamped_file_name(original: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", now.timestamp_millis(), sanitize_file_name(original))
}

/// Object key for a media upload: `<category>/<stamped name>`.
pub fn media_key(category: MediaCategory, file_name: &str) -> String {
    format!("{}/{}", category, file_name)
}

/// Where [`put_stamped`] stored an upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub file_name: String,
    pub key: String,
    pub url: String,
}

/// Store `bytes` as `<folder>/<millis>-<name>`. The object store never
/// overwrites, so a name already taken in this millisecond moves the stamp
/// forward until a free one is found.
pub async fn put_stamped(
    objects: &dyn ObjectStore,
    bucket: Bucket,
    folder: Option<&str>,
    original: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<StoredUpload, StoreError> {
    let mut last_key = String::new();
    for attempt in 0..STAMP_ATTEMPTS {
        let file_name = stamped_file_name(original, now + Duration::milliseconds(attempt));
        let key = match folder {
            Some(folder) => format!("{}/{}", folder, file_name),
            None => file_name.clone(),
        };
        match objects.put(bucket, &key, bytes).await {
            Ok(url) => return Ok(StoredUpload { file_name, key, url }),
            Err(StoreError::AlreadyExists(_)) => {
                tracing::debug!(key = %key, "upload name taken, moving stamp forward");
                last_key = key;
            }
            Err(e) => return Err(e),
        }
    }
    Err(StoreError::AlreadyExists(last_key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    Media,
    Blog,
    Project,
    Local,
}

/// Entry of the locally cached fallback list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalMediaEntry {
    pub file_name: String,
    pub file_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub source: MediaSource,
    pub filename: String,
    pub display_title: String,
    pub url: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LibraryEntry {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.uploaded_at.or(self.created_at)
    }
}

/// Media rows saved while running against a local storage emulator carry
/// `http://localhost` URLs; point them at the object store instead.
pub fn public_media_url(item: &MediaItem, objects: &dyn ObjectStore) -> String {
    if item.file_url.starts_with("http://localhost") {
        let key = media_key(MediaCategory::normalize(Some(&item.category)), &item.file_name);
        return objects.public_url(Bucket::Media, &key);
    }
    item.file_url.clone()
}

fn non_empty_or_other(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => "Other".to_string(),
    }
}

/// Merge every image-bearing source into one list, newest first. Entries
/// without any timestamp go last.
pub fn build_library(
    media: Vec<MediaItem>,
    blogs: Vec<Blog>,
    projects: Vec<Project>,
    local: Vec<LocalMediaEntry>,
    objects: &dyn ObjectStore,
) -> Vec<LibraryEntry> {
    let mut entries = Vec::with_capacity(media.len() + blogs.len() + projects.len() + local.len());

    entries.extend(media.into_iter().map(|item| LibraryEntry {
        id: Some(item.id),
        source: MediaSource::Media,
        url: public_media_url(&item, objects),
        filename: item.file_name.clone(),
        display_title: item.file_name,
        category: non_empty_or_other(Some(&item.category)),
        uploaded_at: Some(item.uploaded_at),
        created_at: None,
    }));

    entries.extend(blogs.into_iter().filter_map(|blog| {
        let url = blog.image_url?;
        Some(LibraryEntry {
            id: Some(blog.id),
            source: MediaSource::Blog,
            filename: format!("Blog: {}", blog.title),
            display_title: blog.title,
            url,
            category: "Blogs".to_string(),
            uploaded_at: None,
            created_at: Some(blog.created_at),
        })
    }));

    entries.extend(projects.into_iter().filter_map(|project| {
        let url = project.image_url?;
        Some(LibraryEntry {
            id: Some(project.id),
            source: MediaSource::Project,
            filename: format!("Project: {}", project.title),
            display_title: project.title,
            url,
            category: "Projects".to_string(),
            uploaded_at: None,
            created_at: Some(project.created_at),
        })
    }));

    entries.extend(local.into_iter().map(|item| LibraryEntry {
        id: None,
        source: MediaSource::Local,
        filename: item.file_name.clone(),
        display_title: item.file_name,
        url: item.file_url,
        category: non_empty_or_other(item.category.as_deref()),
        uploaded_at: item.uploaded_at,
        created_at: None,
    }));

    // Option orders None first, so reversing puts undated entries last.
    entries.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    entries
}

/// "photography " -> "Photography"
fn capitalize(label: &str) -> String {
    let label = label.trim();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => "Other".to_string(),
    }
}

pub fn category_counts(entries: &[LibraryEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(capitalize(&entry.category)).or_insert(0) += 1;
    }
    counts
}
