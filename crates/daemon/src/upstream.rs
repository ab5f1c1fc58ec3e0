//! Weather provider client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;
use weather_relay_core::{ResourceName, ResourceSpec};

const USER_AGENT: &str = concat!("weather-relay/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Source of raw resource bodies.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GETs `url`. Only a 2xx response yields a body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("building upstream http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        // `without_url` keeps the credential out of error messages.
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;
        debug!(bytes = body.len(), "upstream body received");
        Ok(body.to_vec())
    }
}

/// Builds the credentialed endpoint for one resource below `base`.
pub fn resource_endpoint(
    base: &str,
    name: ResourceName,
    api_key: &str,
    location: &str,
) -> Result<String> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), name.upstream_path(location));
    let mut url = Url::parse(&raw).with_context(|| format!("invalid upstream url for {name}"))?;
    url.query_pairs_mut()
        .extend_pairs(name.upstream_query(api_key, location));
    Ok(url.into())
}

pub fn resource_specs(base: &str, api_key: &str, location: &str) -> Result<Vec<ResourceSpec>> {
    ResourceName::ALL
        .into_iter()
        .map(|name| {
            resource_endpoint(base, name, api_key, location).map(|ep| ResourceSpec::new(name, ep))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LOCATION, UPSTREAM_BASE};

    #[test]
    fn builds_provider_urls() {
        let h = resource_endpoint(UPSTREAM_BASE, ResourceName::History, "K", LOCATION).unwrap();
        assert_eq!(
            h,
            "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline/Boston/last90days?key=K"
        );

        let f = resource_endpoint(UPSTREAM_BASE, ResourceName::Forecast, "K", LOCATION).unwrap();
        assert!(f.ends_with("/timeline/Boston?unitGroup=us&key=K"), "{f}");

        let c = resource_endpoint(UPSTREAM_BASE, ResourceName::Current, "K", LOCATION).unwrap();
        assert!(
            c.ends_with("/weatherdata/forecast?aggregateHours=24&contentType=json&unitGroup=us&locationMode=single&key=K&locations=Boston"),
            "{c}"
        );
    }

    #[test]
    fn escapes_credential() {
        let url = resource_endpoint("http://127.0.0.1:1", ResourceName::History, "a&b=c", "X").unwrap();
        assert!(url.ends_with("?key=a%26b%3Dc"), "{url}");
    }

    #[test]
    fn specs_cover_every_resource() {
        let specs = resource_specs("http://127.0.0.1:1/", "K", "X").unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names, ResourceName::ALL);
        assert!(specs[0].endpoint.starts_with("http://127.0.0.1:1/timeline/X"));
    }
}
