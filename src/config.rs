//! Process configuration, read from the environment.

use anyhow::{Context, Result};
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Level for this crate's own log events.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// GeoNames account name. Neighbour and language data are disabled without it.
    #[serde(default)]
    pub geonames_username: Option<String>,
    #[serde(default = "default_geonames_base_url")]
    pub geonames_base_url: String,

    /// How often neighbour lists are refreshed. `0` disables refreshing.
    #[serde(
        default = "default_update_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub neighbours_update_interval: Duration,
    /// How often language lists are refreshed. `0` disables refreshing.
    #[serde(
        default = "default_update_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub languages_update_interval: Duration,

    /// Lifetime of memoized lookup enrichments.
    #[serde(default = "default_cache_ttl", deserialize_with = "deserialize_duration")]
    pub cache_ttl: Duration,
    /// Pause after every GeoNames request.
    #[serde(
        default = "default_request_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub request_delay: Duration,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    /// How long shutdown waits for an in-flight refresh to wind down.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Extract from raw (unprefixed) environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().context("Failed to load config")
    }

    /// The configured GeoNames username, if set to something non-blank.
    pub fn geonames_username(&self) -> Option<&str> {
        self.geonames_username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_geonames_base_url() -> String {
    "http://api.geonames.org".to_string()
}

fn default_update_interval() -> Duration {
    Duration::from_secs(168 * 60 * 60)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_request_delay() -> Duration {
    Duration::from_millis(1100)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Parse a duration such as `168h`, `1100ms` or `90` (seconds).
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    const UNITS: [TimeUnit; 5] = [
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
    ];
    let parser = DurationParser::with_time_units(&UNITS);
    let parsed = parser
        .parse(value.trim())
        .map_err(|e| format!("invalid duration '{value}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{value}': {e}"))
}

/// Accepts either a duration string or a bare number of seconds.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let mut figment = Figment::new();
        for (key, value) in pairs {
            figment = figment.merge(Serialized::default(key, value));
        }
        Config::from_figment(figment)
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("1100ms"), Ok(Duration::from_millis(1100)));
        assert_eq!(parse_duration("168h"), Ok(Duration::from_secs(168 * 3600)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("90"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.geonames_username(), None);
        assert_eq!(config.geonames_base_url, "http://api.geonames.org");
        assert_eq!(config.neighbours_update_interval, Duration::from_secs(604_800));
        assert_eq!(config.languages_update_interval, Duration::from_secs(604_800));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.request_delay, Duration::from_millis(1100));
        assert_eq!(config.request_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("geonames_username", "demo"),
            ("neighbours_update_interval", "24h"),
            ("languages_update_interval", "0"),
            ("request_delay", "250ms"),
        ])
        .unwrap();
        assert_eq!(config.geonames_username(), Some("demo"));
        assert_eq!(config.neighbours_update_interval, Duration::from_secs(86_400));
        assert_eq!(config.languages_update_interval, Duration::ZERO);
        assert_eq!(config.request_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_blank_username_is_unset() {
        let config = config_from(&[("geonames_username", "  ")]).unwrap();
        assert_eq!(config.geonames_username(), None);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        assert!(config_from(&[("cache_ttl", "forever")]).is_err());
    }
}
