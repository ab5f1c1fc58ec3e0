use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use weather_relay_core::ResourceSpec;

use crate::upstream;

/// Visual Crossing REST service root.
pub const UPSTREAM_BASE: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services";

/// Location every resource is fetched for.
pub const LOCATION: &str = "Boston";

#[derive(Parser, Debug)]
#[command(name = "weather-relay", version, about = "Polls the weather provider and serves the last good copy")]
pub struct Args {
    /// Listen address, e.g. 0.0.0.0:3000
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Directory holding one cached JSON body per resource.
    #[arg(long, default_value = ".weather-relay/cache")]
    pub cache_dir: PathBuf,

    /// Provider API key.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Upper bound on a single upstream fetch, in seconds.
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    pub log: String,
}

#[derive(Clone)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub cache_dir: PathBuf,
    pub api_key: String,
    pub fetch_timeout: Duration,
}

impl RelayConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let api_key = args.api_key.trim().to_string();
        if api_key.is_empty() {
            bail!("API_KEY must not be empty");
        }
        if args.fetch_timeout_secs == 0 {
            bail!("--fetch-timeout-secs must be > 0");
        }
        Ok(Self {
            listen: args.listen,
            cache_dir: args.cache_dir,
            api_key,
            fetch_timeout: Duration::from_secs(args.fetch_timeout_secs),
        })
    }

    /// The three resources with their credentialed endpoints.
    pub fn resources(&self) -> Result<Vec<ResourceSpec>> {
        upstream::resource_specs(UPSTREAM_BASE, &self.api_key, LOCATION)
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("listen", &self.listen)
            .field("cache_dir", &self.cache_dir)
            .field("api_key", &"<redacted>")
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

/// Loads `.env` from the working directory or a parent, if present.
pub fn load_dotenv() -> Result<PathBuf, dotenvy::Error> {
    dotenvy::dotenv()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["weather-relay"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let cfg = RelayConfig::from_args(parse(&["--api-key", "abc"])).unwrap();
        assert_eq!(cfg.listen.port(), 3000);
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(30));
        assert_eq!(cfg.resources().unwrap().len(), 3);
    }

    #[test]
    fn rejects_blank_key_and_zero_timeout() {
        assert!(RelayConfig::from_args(parse(&["--api-key", "  "])).is_err());
        assert!(RelayConfig::from_args(parse(&["--api-key", "k", "--fetch-timeout-secs", "0"])).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let cfg = RelayConfig::from_args(parse(&["--api-key", "hunter2"])).unwrap();
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
