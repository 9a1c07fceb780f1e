use crate::error::CommodityError;
use chrono::Duration;

/// Upper bound for the freshness window (one day)
const MAX_FRESHNESS_SECONDS: u64 = 86_400;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Cache settings
    pub cache_config: CacheConfig,

    /// Seed for the market simulator RNG (reproducible demos)
    pub simulation_seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a generated snapshot is served before regeneration (seconds)
    pub freshness_seconds: u64,

    /// `Cache-Control: max-age` advertised to clients (seconds)
    pub cache_control_max_age: u64,
}

impl CacheConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::seconds(self.freshness_seconds as i64)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_seconds: 600,
            cache_control_max_age: 600,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_vars(|key| std::env::var(key).ok())?)
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, CommodityError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CacheConfig::default();

        let config = Config {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            cache_config: CacheConfig {
                freshness_seconds: parse_or(
                    &lookup,
                    "CACHE_FRESHNESS_SECONDS",
                    defaults.freshness_seconds,
                )?,
                cache_control_max_age: parse_or(
                    &lookup,
                    "CACHE_CONTROL_MAX_AGE",
                    defaults.cache_control_max_age,
                )?,
            },
            simulation_seed: lookup("SIMULATION_SEED")
                .map(|raw| parse_value("SIMULATION_SEED", &raw))
                .transpose()?,
        };

        if !(1..=MAX_FRESHNESS_SECONDS).contains(&config.cache_config.freshness_seconds) {
            return Err(CommodityError::Config(format!(
                "CACHE_FRESHNESS_SECONDS must be between 1 and {}",
                MAX_FRESHNESS_SECONDS
            )));
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CommodityError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, CommodityError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| CommodityError::Config(format!("{}={:?}: {}", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, CommodityError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.cache_config.freshness_window(), Duration::minutes(10));
        assert_eq!(config.cache_config.cache_control_max_age, 600);
        assert!(config.simulation_seed.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "3000"),
            ("CACHE_FRESHNESS_SECONDS", "60"),
            ("CACHE_CONTROL_MAX_AGE", "30"),
            ("SIMULATION_SEED", "42"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.cache_config.freshness_seconds, 60);
        assert_eq!(config.cache_config.cache_control_max_age, 30);
        assert_eq!(config.simulation_seed, Some(42));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            load(&[("SERVER_PORT", "http")]),
            Err(CommodityError::Config(_))
        ));
        assert!(matches!(
            load(&[("CACHE_FRESHNESS_SECONDS", "0")]),
            Err(CommodityError::Config(_))
        ));
        assert!(matches!(
            load(&[("CACHE_FRESHNESS_SECONDS", "100000")]),
            Err(CommodityError::Config(_))
        ));
    }
}
