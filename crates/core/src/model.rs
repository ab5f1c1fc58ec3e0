//! Resource definitions and the cache/status values derived from them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::EpochMs;

/// One of the upstream datasets the relay keeps warm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceName {
    /// Trailing 90 days of daily readings.
    History,
    /// Multi-day forecast readings.
    Forecast,
    /// Aggregated 24h current conditions.
    Current,
}

impl ResourceName {
    /// Every resource, in startup order.
    pub const ALL: [ResourceName; 3] = [
        ResourceName::History,
        ResourceName::Forecast,
        ResourceName::Current,
    ];

    /// Cache key and URL path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceName::History => "history",
            ResourceName::Forecast => "forecast",
            ResourceName::Current => "current",
        }
    }

    /// Refresh period in minutes.
    pub fn interval_minutes(self) -> u64 {
        match self {
            ResourceName::History => 1440,
            ResourceName::Forecast => 60,
            ResourceName::Current => 30,
        }
    }

    /// Refresh period as a [`Duration`].
    pub fn refresh_interval(self) -> Duration {
        Duration::from_secs(self.interval_minutes() * 60)
    }

    /// Path below the provider's service root.
    pub fn upstream_path(self, location: &str) -> String {
        match self {
            ResourceName::History => format!("timeline/{location}/last90days"),
            ResourceName::Forecast => format!("timeline/{location}"),
            ResourceName::Current => "weatherdata/forecast".to_string(),
        }
    }

    /// Query parameters, in the order the provider documents them.
    pub fn upstream_query(self, api_key: &str, location: &str) -> Vec<(&'static str, String)> {
        match self {
            ResourceName::History => vec![("key", api_key.to_string())],
            ResourceName::Forecast => vec![
                ("unitGroup", "us".to_string()),
                ("key", api_key.to_string()),
            ],
            ResourceName::Current => vec![
                ("aggregateHours", "24".to_string()),
                ("contentType", "json".to_string()),
                ("unitGroup", "us".to_string()),
                ("locationMode", "single".to_string()),
                ("key", api_key.to_string()),
                ("locations", location.to_string()),
            ],
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a path segment does not name a known resource.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown resource: {0}")]
pub struct ParseResourceError(pub String);

impl FromStr for ResourceName {
    type Err = ParseResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceName::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseResourceError(s.to_string()))
    }
}

/// A resource with its endpoint resolved (credential included) and its schedule.
#[derive(Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Which dataset.
    pub name: ResourceName,
    /// Fully-qualified upstream URL.
    pub endpoint: String,
    /// Time between ticks.
    pub interval: Duration,
}

impl ResourceSpec {
    /// Spec using the resource's standard refresh interval.
    pub fn new(name: ResourceName, endpoint: impl Into<String>) -> Self {
        Self {
            name,
            endpoint: endpoint.into(),
            interval: name.refresh_interval(),
        }
    }
}

// Endpoints carry the credential, keep them out of logs.
impl fmt::Debug for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSpec")
            .field("name", &self.name)
            .field("endpoint", &"<redacted>")
            .field("interval", &self.interval)
            .finish()
    }
}

/// Last successfully fetched upstream body for a resource.
///
/// Payload and timestamp travel together so a reader never sees one without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Raw upstream response body, stored verbatim. Clones share the buffer.
    pub payload: Bytes,
    /// When the fetch that produced `payload` completed.
    pub fetched_at_ms: EpochMs,
}

/// Readiness summary reported by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceStatus {
    /// Resource key.
    pub name: ResourceName,
    /// Whether at least one fetch has succeeded.
    pub ready: bool,
    /// Timestamp of the last successful fetch, if any.
    pub last_fetch_ms: Option<EpochMs>,
    /// Configured refresh period.
    pub interval_minutes: u64,
}
