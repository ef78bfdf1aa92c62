//! Page-load tracking: visit counters and approximate visitor origin.

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DailyVisit, VisitorLocation};
use crate::store::{StoreError, VisitLedger};

pub const PRIVATE_IP_NOTE: &str = "Local/Private IP";

/// Locations returned by the read endpoints.
pub const RECENT_LOCATIONS: usize = 20;
/// Days included in the stats summary.
pub const STATS_DAYS: usize = 30;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Body of an ip-api.com lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLookup {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<GeoLookup, GeoError>;
}

pub struct IpApiLocator {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiLocator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn lookup(&self, ip: &str) -> Result<GeoLookup, GeoError> {
        let url = format!(
            "{}/json/{}?fields=status,message,country,regionName,city,query",
            self.base_url, ip
        );
        let lookup = self.client.get(url).send().await?.json().await?;
        Ok(lookup)
    }
}

/// Loopback and private ranges, matched on the literal address text.
/// Anything that is not an IP address is never looked up either.
pub fn is_private_ip(ip: &str) -> bool {
    let ip = ip.trim();
    let ip = ip.strip_prefix("::ffff:").unwrap_or(ip);
    ip.parse::<IpAddr>().is_err()
        || ip == "::1"
        || ip == "127.0.0.1"
        || ip.starts_with("192.168.")
        || ip.starts_with("10.")
        || ip.starts_with("172.")
}

/// First `X-Forwarded-For` hop, else the socket peer. A forwarded value
/// that is not an address (with or without port) becomes `unknown`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(hop) => hop
            .parse::<IpAddr>()
            .or_else(|_| hop.parse::<SocketAddr>().map(|addr| addr.ip()))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        None => peer
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Build the location entry for `ip`. Never fails: lookup problems end up
/// in the entry's note.
pub async fn resolve_location(locator: &dyn GeoLocator, ip: &str, date: NaiveDate) -> VisitorLocation {
    let location = VisitorLocation::new(ip, date);
    if is_private_ip(ip) {
        return location.with_note(PRIVATE_IP_NOTE);
    }

    match locator.lookup(ip).await {
        Ok(geo) if geo.status == "success" => VisitorLocation {
            country: geo.country,
            region: geo.region_name,
            city: geo.city,
            ..location
        },
        Ok(geo) => location.with_note(format!(
            "Geolocation failed: {}",
            geo.message.as_deref().unwrap_or("Unknown error")
        )),
        Err(e) => {
            tracing::warn!(ip = %ip, error = %e, "geolocation lookup failed");
            location.with_note(format!("Geolocation error: {}", e))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisitStats {
    pub total: u64,
    /// Newest first.
    pub daily: Vec<DailyVisit>,
    pub locations: Vec<VisitorLocation>,
}

pub struct VisitTracker {
    ledger: Arc<dyn VisitLedger>,
    locator: Arc<dyn GeoLocator>,
}

impl VisitTracker {
    pub fn new(ledger: Arc<dyn VisitLedger>, locator: Arc<dyn GeoLocator>) -> Self {
        Self { ledger, locator }
    }

    /// Count one page load. The total, daily and location steps are
    /// independent; only a failed total is reported to the caller.
    pub async fn record_visit(&self, ip: &str, today: NaiveDate) -> Result<u64, StoreError> {
        let total = self.ledger.increment_total().await;
        if let Err(e) = &total {
            tracing::error!(error = %e, "failed to increment visit total");
        }

        if let Err(e) = self.ledger.increment_day(today).await {
            tracing::error!(error = %e, date = %today, "failed to increment daily visits");
        }

        let location = resolve_location(self.locator.as_ref(), ip, today).await;
        tracing::debug!(ip = %location.ip, note = ?location.note, "visitor location resolved");
        if let Err(e) = self.ledger.record_location(location).await {
            tracing::error!(error = %e, "failed to record visitor location");
        }

        total
    }

    pub async fn stats(&self) -> Result<VisitStats, StoreError> {
        let total = self.ledger.total().await?;
        let mut daily = self.ledger.daily().await?;
        daily.sort_by(|a, b| b.date.cmp(&a.date));
        daily.truncate(STATS_DAYS);
        let locations = self.ledger.locations(RECENT_LOCATIONS).await?;
        Ok(VisitStats {
            total,
            daily,
            locations,
        })
    }
}
