//! Storage interface with two interchangeable backends.
//!
//! `file` keeps every collection in a JSON file next to the server and
//! uploads on local disk; `remote` talks to the hosted Postgres tables and
//! object storage. Handlers only see the traits below.

pub mod error;
pub mod file;
pub mod remote;

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::{StorageBackend, StorageConfig};
use crate::models::{
    Blog, Certification, DailyVisit, Entity, MediaItem, Project, RecordId, Skill, VisitorLocation,
};

pub use error::StoreError;

/// Filters understood by every repository listing.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub category: Option<String>,
    pub exclude_categories: Vec<String>,
    pub limit: Option<usize>,
}

impl ListFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    /// In-memory evaluation, used by the file backend.
    pub fn matches(&self, category: Option<&str>) -> bool {
        if let Some(wanted) = &self.category {
            if category != Some(wanted.as_str()) {
                return false;
            }
        }
        match category {
            Some(c) => !self.exclude_categories.iter().any(|e| e == c),
            None => true,
        }
    }
}

#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<E>, StoreError>;

    async fn create(&self, new: E::New) -> Result<E, StoreError>;

    /// Merge `patch` into the record; fails with `NotFound` for unknown ids.
    async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, StoreError>;

    /// Remove and return the record; fails with `NotFound` for unknown ids.
    async fn delete(&self, id: RecordId) -> Result<E, StoreError>;
}

/// Page-load counters and the visitor location log.
#[async_trait]
pub trait VisitLedger: Send + Sync {
    async fn total(&self) -> Result<u64, StoreError>;

    async fn increment_total(&self) -> Result<u64, StoreError>;

    /// All daily counters, oldest first.
    async fn daily(&self) -> Result<Vec<DailyVisit>, StoreError>;

    /// Bump the counter for `date`, creating it at 1 if absent.
    async fn increment_day(&self, date: NaiveDate) -> Result<DailyVisit, StoreError>;

    /// Most recent locations first.
    async fn locations(&self, limit: usize) -> Result<Vec<VisitorLocation>, StoreError>;

    async fn record_location(&self, location: VisitorLocation) -> Result<(), StoreError>;
}

/// Upload destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    BlogImages,
    ProjectImages,
    Media,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::BlogImages => "blog-images",
            Bucket::ProjectImages => "project-images",
            Bucket::Media => "media",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return the publicly reachable path.
    /// Never replaces an existing object; a taken key is `AlreadyExists`.
    async fn put(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<String, StoreError>;

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StoreError>;

    fn public_url(&self, bucket: Bucket, key: &str) -> String;

    /// Inverse of `public_url`; `None` for URLs this store did not issue.
    fn key_from_url(&self, bucket: Bucket, url: &str) -> Option<String>;
}

/// Reject keys that could escape their bucket.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::Invalid(format!("invalid object key: {key}")));
    }
    Ok(())
}

#[derive(Clone)]
enum HealthTarget {
    File(PathBuf),
    Remote(sqlx::PgPool),
}

/// Everything the handlers need to read and write content.
#[derive(Clone)]
pub struct ContentStore {
    pub blogs: Arc<dyn Repository<Blog>>,
    pub projects: Arc<dyn Repository<Project>>,
    pub skills: Arc<dyn Repository<Skill>>,
    pub media: Arc<dyn Repository<MediaItem>>,
    pub certifications: Arc<dyn Repository<Certification>>,
    pub visits: Arc<dyn VisitLedger>,
    pub objects: Arc<dyn ObjectStore>,
    backend: StorageBackend,
    health_target: HealthTarget,
}

impl ContentStore {
    /// Open the backend selected by configuration.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.backend {
            StorageBackend::File => Self::local(config).await,
            StorageBackend::Remote => Self::remote(config).await,
        }
    }

    pub async fn local(config: &StorageConfig) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        tokio::fs::create_dir_all(&config.public_dir).await?;
        tracing::info!(
            data_dir = %config.data_dir.display(),
            public_dir = %config.public_dir.display(),
            "Using flat-file storage"
        );

        Ok(Self {
            blogs: Arc::new(file::FileRepository::<Blog>::new(&config.data_dir)),
            projects: Arc::new(file::FileRepository::<Project>::new(&config.data_dir)),
            skills: Arc::new(file::FileRepository::<Skill>::new(&config.data_dir)),
            media: Arc::new(file::FileRepository::<MediaItem>::new(&config.data_dir)),
            certifications: Arc::new(file::FileRepository::<Certification>::new(&config.data_dir)),
            visits: Arc::new(file::FileVisitLedger::new(
                &config.data_dir,
                config.location_cap,
            )),
            objects: Arc::new(file::LocalObjectStore::new(&config.public_dir)),
            backend: StorageBackend::File,
            health_target: HealthTarget::File(config.data_dir.clone()),
        })
    }

    pub async fn remote(config: &StorageConfig) -> Result<Self, StoreError> {
        let pool = remote::init_pool(&config.database).await?;
        if config.database.migrate {
            remote::run_migrations(&pool).await?;
        }
        let objects = remote::RemoteObjectStore::new(
            config.storage_url.clone().ok_or_else(|| {
                StoreError::Invalid("STORAGE_URL is required for the remote backend".into())
            })?,
            config.storage_service_key.clone().unwrap_or_default(),
        );
        tracing::info!("Using hosted table storage");

        Ok(Self {
            blogs: Arc::new(remote::TableRepository::<Blog>::new(pool.clone())),
            projects: Arc::new(remote::TableRepository::<Project>::new(pool.clone())),
            skills: Arc::new(remote::TableRepository::<Skill>::new(pool.clone())),
            media: Arc::new(remote::TableRepository::<MediaItem>::new(pool.clone())),
            certifications: Arc::new(remote::TableRepository::<Certification>::new(pool.clone())),
            visits: Arc::new(remote::TableVisitLedger::new(pool.clone())),
            objects: Arc::new(objects),
            backend: StorageBackend::Remote,
            health_target: HealthTarget::Remote(pool),
        })
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    /// Round-trip time to the backing store.
    pub async fn health(&self) -> Result<Duration, StoreError> {
        let start = std::time::Instant::now();
        match &self.health_target {
            HealthTarget::File(dir) => {
                let meta = tokio::fs::metadata(dir).await?;
                if !meta.is_dir() {
                    return Err(StoreError::Invalid(format!(
                        "{} is not a directory",
                        dir.display()
                    )));
                }
            }
            HealthTarget::Remote(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_category_and_exclusions() {
        let filter = ListFilter {
            exclude_categories: vec!["Photography".into()],
            ..Default::default()
        };
        assert!(filter.matches(Some("Web Development")));
        assert!(!filter.matches(Some("Photography")));
        assert!(filter.matches(None));

        let only = ListFilter::category("Photography");
        assert!(only.matches(Some("Photography")));
        assert!(!only.matches(Some("Web")));
        assert!(!only.matches(None));
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("Photography/123-a.jpg").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs.jpg").is_err());
        assert!(validate_key("a//b.jpg").is_err());
        assert!(validate_key("a\\b.jpg").is_err());
        assert!(validate_key("").is_err());
    }
}
