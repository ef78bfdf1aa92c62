use std::{sync::Arc, time::Instant};

use crate::config::AppConfig;
use crate::store::{ContentStore, StoreError};
use crate::tracking::{GeoLocator, IpApiLocator, VisitTracker};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: ContentStore,
    pub tracker: Arc<VisitTracker>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, store: ContentStore, locator: Arc<dyn GeoLocator>) -> Self {
        let tracker = Arc::new(VisitTracker::new(store.visits.clone(), locator));
        Self {
            config: Arc::new(config),
            store,
            tracker,
            started_at: Instant::now(),
        }
    }

    /// Open the configured store and wire the ip-api locator.
    pub async fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        let store = ContentStore::open(&config.storage).await?;
        let locator = Arc::new(IpApiLocator::new(config.geo_lookup_url.clone()));
        Ok(Self::new(config, store, locator))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
