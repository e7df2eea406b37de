//! Application configuration, loaded from environment variables via figment.

use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::Env;
use fundu::DurationParser;
use serde::{Deserialize, Deserializer};

use crate::sync::admission::RefreshPeriod;
use crate::sync::orchestrator::CursorPolicy;

/// Regions swept when `REGIONS` is not set: the states plus DC and the territories.
pub const DEFAULT_REGIONS: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "GU", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "PR", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VI", "VA", "WA", "WV", "WI", "WY",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Ledger key for the refresh job.
    #[serde(default = "default_job_name")]
    pub job_name: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: NonZeroUsize,
    #[serde(
        default = "default_fetch_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub fetch_timeout: Duration,
    #[serde(default)]
    pub refresh_period: RefreshPeriod,
    #[serde(default)]
    pub cursor_policy: CursorPolicy,
    #[serde(default = "default_regions", deserialize_with = "deserialize_regions")]
    pub regions: Vec<String>,

    #[serde(default = "default_requests_per_second")]
    pub upstream_requests_per_second: NonZeroU32,
    #[serde(default = "default_burst")]
    pub upstream_burst: NonZeroU32,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub upstream_request_timeout: Duration,

    /// When set, `serve` also triggers the refresh on this interval.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub schedule_interval: Option<Duration>,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

/// Outbound request budget for the upstream client.
#[derive(Debug, Clone)]
pub struct RateLimitingConfig {
    pub requests_per_second: NonZeroU32,
    pub burst: NonZeroU32,
    pub request_timeout: Duration,
}

impl Config {
    /// Load from the process environment (after `.env` has been applied).
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment.extract().context("Failed to load config")?;
        if config.regions.is_empty() {
            anyhow::bail!("REGIONS must name at least one region");
        }
        Ok(config)
    }

    pub fn rate_limiting(&self) -> RateLimitingConfig {
        RateLimitingConfig {
            requests_per_second: self.upstream_requests_per_second,
            burst: self.upstream_burst,
            request_timeout: self.upstream_request_timeout,
        }
    }
}

fn default_upstream_base_url() -> String {
    "https://transfer.gatech.edu/api/".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_job_name() -> String {
    "equivalency_refresh".to_string()
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN)
}

fn default_max_concurrent_fetches() -> NonZeroUsize {
    NonZeroUsize::new(16).unwrap_or(NonZeroUsize::MIN)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_regions() -> Vec<String> {
    DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect()
}

fn default_requests_per_second() -> NonZeroU32 {
    NonZeroU32::new(10).unwrap_or(NonZeroU32::MIN)
}

fn default_burst() -> NonZeroU32 {
    NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// A duration given as bare seconds (`30`) or with a unit (`"30s"`, `"5m"`, `"1.5h"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

fn parse_duration(raw: RawDuration) -> Result<Duration, String> {
    match raw {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => {
            let parsed = DurationParser::with_all_time_units()
                .parse(text.trim())
                .map_err(|e| format!("invalid duration '{text}': {e}"))?;
            Duration::try_from(parsed).map_err(|e| format!("invalid duration '{text}': {e}"))
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    parse_duration(RawDuration::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDuration>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDuration::Text(t)) if t.trim().is_empty() => Ok(None),
        Some(raw) => parse_duration(raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Regions as a comma/space separated list (`"GA, AL,FL"`), normalized to uppercase.
fn deserialize_regions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let mut regions: Vec<String> = Vec::new();
    for region in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_uppercase)
    {
        if !regions.contains(&region) {
            regions.push(region);
        }
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Figment {
        Figment::new().merge(("database_url", "postgres://localhost/transfer"))
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_figment(base()).unwrap();
        assert_eq!(config.batch_size.get(), 100);
        assert_eq!(config.fetch_timeout, Duration::from_secs(60));
        assert_eq!(config.refresh_period, RefreshPeriod::Monthly);
        assert_eq!(config.cursor_policy, CursorPolicy::Advance);
        assert_eq!(config.regions.len(), DEFAULT_REGIONS.len());
        assert!(config.schedule_interval.is_none());
    }

    #[test]
    fn test_regions_parsed_from_list() {
        let config = Config::from_figment(base().merge(("regions", "ga, al,FL  ga"))).unwrap();
        assert_eq!(config.regions, vec!["GA", "AL", "FL"]);
    }

    #[test]
    fn test_empty_regions_rejected() {
        assert!(Config::from_figment(base().merge(("regions", " , "))).is_err());
    }

    #[test]
    fn test_durations_with_units() {
        let config = Config::from_figment(
            base()
                .merge(("fetch_timeout", "90s"))
                .merge(("schedule_interval", "6h"))
                .merge(("shutdown_timeout", 3)),
        )
        .unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(90));
        assert_eq!(config.schedule_interval, Some(Duration::from_secs(6 * 3600)));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_duration_rejected() {
        assert!(Config::from_figment(base().merge(("fetch_timeout", "soon"))).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(Config::from_figment(base().merge(("batch_size", 0))).is_err());
    }

    #[test]
    fn test_policy_and_period_names() {
        let config = Config::from_figment(
            base()
                .merge(("cursor_policy", "retry_window"))
                .merge(("refresh_period", "daily")),
        )
        .unwrap();
        assert_eq!(config.cursor_policy, CursorPolicy::RetryWindow);
        assert_eq!(config.refresh_period, RefreshPeriod::Daily);
    }

    #[test]
    fn test_missing_database_url() {
        assert!(Config::from_figment(Figment::new()).is_err());
    }
}
