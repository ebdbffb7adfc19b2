use std::time::Duration;

use thiserror::Error;

pub use hearth_adapters::persistence::sqlite::{DEFAULT_INCIDENT_TTL_SECS, DEFAULT_MAX_CONNECTIONS};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://hearth.db?mode=rwc";
/// Longest accepted retention, a century.
pub const MAX_INCIDENT_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub incident_ttl_secs: i64,
    pub purge_interval_secs: u64,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            incident_ttl_secs: DEFAULT_INCIDENT_TTL_SECS,
            purge_interval_secs: DEFAULT_PURGE_INTERVAL_SECS,
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `HEARTH_*` settings through `lookup`, falling back to defaults
    /// for anything unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            database_url: lookup("HEARTH_DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_or(&lookup, "HEARTH_MAX_CONNECTIONS", defaults.max_connections)?,
            incident_ttl_secs: parse_or(
                &lookup,
                "HEARTH_INCIDENT_TTL_SECS",
                defaults.incident_ttl_secs,
            )?,
            purge_interval_secs: parse_or(
                &lookup,
                "HEARTH_PURGE_INTERVAL_SECS",
                defaults.purge_interval_secs,
            )?,
            log_filter: lookup("HEARTH_LOG")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
        };

        if config.max_connections == 0 {
            return Err(invalid("HEARTH_MAX_CONNECTIONS", config.max_connections));
        }
        if !(0..=MAX_INCIDENT_TTL_SECS).contains(&config.incident_ttl_secs) {
            return Err(invalid("HEARTH_INCIDENT_TTL_SECS", config.incident_ttl_secs));
        }
        if config.purge_interval_secs == 0 {
            return Err(invalid("HEARTH_PURGE_INTERVAL_SECS", config.purge_interval_secs));
        }
        Ok(config)
    }

    pub fn incident_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.incident_ttl_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.incident_ttl(), chrono::Duration::days(30));
        assert_eq!(config.purge_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HEARTH_DATABASE_URL", "sqlite::memory:"),
            ("HEARTH_MAX_CONNECTIONS", "2"),
            ("HEARTH_INCIDENT_TTL_SECS", "60"),
            ("HEARTH_PURGE_INTERVAL_SECS", " 10 "),
            ("HEARTH_LOG", "hearth_app=debug"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.incident_ttl(), chrono::Duration::seconds(60));
        assert_eq!(config.purge_interval(), Duration::from_secs(10));
        assert_eq!(config.log_filter, "hearth_app=debug");
    }

    #[test]
    fn falls_back_to_rust_log() {
        let config = Config::from_lookup(lookup(&[("RUST_LOG", "warn")])).unwrap();
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn rejects_non_numeric_values() {
        let result = Config::from_lookup(lookup(&[("HEARTH_INCIDENT_TTL_SECS", "a month")]));
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                key: "HEARTH_INCIDENT_TTL_SECS",
                value: "a month".into()
            })
        );
    }

    #[test]
    fn rejects_zero_purge_interval() {
        let result = Config::from_lookup(lookup(&[("HEARTH_PURGE_INTERVAL_SECS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_negative_ttl() {
        let result = Config::from_lookup(lookup(&[("HEARTH_INCIDENT_TTL_SECS", "-1")]));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_ttl_beyond_a_century() {
        let too_long = (MAX_INCIDENT_TTL_SECS + 1).to_string();
        let result = Config::from_lookup(lookup(&[("HEARTH_INCIDENT_TTL_SECS", too_long.as_str())]));
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                key: "HEARTH_INCIDENT_TTL_SECS",
                value: too_long
            })
        );

        let max = MAX_INCIDENT_TTL_SECS.to_string();
        let config = Config::from_lookup(lookup(&[("HEARTH_INCIDENT_TTL_SECS", max.as_str())])).unwrap();
        assert_eq!(config.incident_ttl(), chrono::Duration::days(100 * 365));
    }
}
