//! Flat-file backend: one JSON file per collection in the data directory.

mod json_file;
mod objects;

pub use json_file::JsonFile;
pub use objects::LocalObjectStore;

use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{ListFilter, Repository, StoreError, VisitLedger};
use crate::models::{DailyVisit, Entity, RecordId, VisitCount, VisitorLocation};

pub const VISITS_FILE: &str = "visits.json";
pub const VISITS_DAILY_FILE: &str = "visits_daily.json";
pub const VISITS_LOCATIONS_FILE: &str = "visits_locations.json";

/// Default bound on the visitor location log.
pub const DEFAULT_LOCATION_CAP: usize = 100;

/// Time-derived id that is still unique when two records land in the same
/// millisecond.
fn next_id<E: Entity>(records: &[E]) -> Result<RecordId, StoreError> {
    let now = Utc::now().timestamp_millis();
    let max = records.iter().map(|r| r.id()).max().unwrap_or(0);
    let after = max
        .checked_add(1)
        .ok_or_else(|| StoreError::Invalid(format!("{} ids exhausted", E::COLLECTION)))?;
    Ok(now.max(after))
}

pub struct FileRepository<E> {
    file: JsonFile<Vec<E>>,
}

impl<E: Entity> FileRepository<E> {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file: JsonFile::new(data_dir.join(format!("{}.json", E::COLLECTION))),
        }
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for FileRepository<E> {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<E>, StoreError> {
        let mut records: Vec<E> = self
            .file
            .read()
            .await
            .into_iter()
            .filter(|r| filter.matches(r.category()))
            .collect();
        E::sort(&mut records);
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn create(&self, new: E::New) -> Result<E, StoreError> {
        let record = self
            .file
            .modify(|records| {
                let record = E::build(next_id(records)?, new, Utc::now());
                records.push(record.clone());
                Ok(record)
            })
            .await?;
        tracing::debug!(collection = E::COLLECTION, id = record.id(), "record created");
        Ok(record)
    }

    async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, StoreError> {
        self.file
            .modify(|records| {
                let record = records
                    .iter_mut()
                    .find(|r| r.id() == id)
                    .ok_or(StoreError::NotFound { label: E::LABEL, id })?;
                record.apply(patch, Utc::now());
                Ok(record.clone())
            })
            .await
    }

    async fn delete(&self, id: RecordId) -> Result<E, StoreError> {
        self.file
            .modify(|records| {
                let idx = records
                    .iter()
                    .position(|r| r.id() == id)
                    .ok_or(StoreError::NotFound { label: E::LABEL, id })?;
                Ok(records.remove(idx))
            })
            .await
    }
}

pub struct FileVisitLedger {
    total: JsonFile<VisitCount>,
    daily: JsonFile<Vec<DailyVisit>>,
    locations: JsonFile<Vec<VisitorLocation>>,
    location_cap: usize,
}

impl FileVisitLedger {
    pub fn new(data_dir: &Path, location_cap: usize) -> Self {
        Self {
            total: JsonFile::new(data_dir.join(VISITS_FILE)),
            daily: JsonFile::new(data_dir.join(VISITS_DAILY_FILE)),
            locations: JsonFile::new(data_dir.join(VISITS_LOCATIONS_FILE)),
            location_cap,
        }
    }
}

#[async_trait]
impl VisitLedger for FileVisitLedger {
    async fn total(&self) -> Result<u64, StoreError> {
        Ok(self.total.read().await.count)
    }

    async fn increment_total(&self) -> Result<u64, StoreError> {
        self.total
            .modify(|visits| {
                visits.count += 1;
                Ok(visits.count)
            })
            .await
    }

    async fn daily(&self) -> Result<Vec<DailyVisit>, StoreError> {
        Ok(self.daily.read().await)
    }

    async fn increment_day(&self, date: NaiveDate) -> Result<DailyVisit, StoreError> {
        self.daily
            .modify(|days| match days.iter_mut().find(|d| d.date == date) {
                Some(day) => {
                    day.count += 1;
                    Ok(day.clone())
                }
                None => {
                    let day = DailyVisit { date, count: 1 };
                    days.push(day.clone());
                    Ok(day)
                }
            })
            .await
    }

    async fn locations(&self, limit: usize) -> Result<Vec<VisitorLocation>, StoreError> {
        let mut locations = self.locations.read().await;
        locations.truncate(limit);
        Ok(locations)
    }

    async fn record_location(&self, location: VisitorLocation) -> Result<(), StoreError> {
        let cap = self.location_cap;
        self.locations
            .modify(|locations| {
                locations.insert(0, location);
                locations.truncate(cap);
                Ok(())
            })
            .await
    }
}
