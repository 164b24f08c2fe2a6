use agentic_client::{AgenticConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use anyhow::{Context, Result};
use intel_cache::CacheConfig;
use std::collections::HashMap;
use std::time::Duration;

use crate::auth::{parse_api_keys, Role};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub agentic: AgenticConfig,
    pub cache: CacheConfig,
    /// Hashed API keys with their roles
    pub api_keys: HashMap<String, Role>,
    pub json_logging: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port: u16 = var("PORT", "3000")
            .parse()
            .context("PORT must be a valid port number")?;
        let timeout_secs: u64 = var("AGENTIC_AI_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .context("AGENTIC_AI_TIMEOUT_SECS must be a number of seconds")?;
        let min_ttl_secs: u64 = var("INTEL_CACHE_MIN_TTL_SECS", "900")
            .parse()
            .context("INTEL_CACHE_MIN_TTL_SECS must be a number of seconds")?;
        let max_ttl_secs: u64 = var("INTEL_CACHE_MAX_TTL_SECS", "1800")
            .parse()
            .context("INTEL_CACHE_MAX_TTL_SECS must be a number of seconds")?;
        let sweep_every: usize = var("INTEL_CACHE_SWEEP_EVERY", "100")
            .parse()
            .context("INTEL_CACHE_SWEEP_EVERY must be a non-negative integer")?;

        if max_ttl_secs < min_ttl_secs {
            anyhow::bail!(
                "INTEL_CACHE_MAX_TTL_SECS ({}) is below INTEL_CACHE_MIN_TTL_SECS ({})",
                max_ttl_secs,
                min_ttl_secs
            );
        }

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port,
            agentic: AgenticConfig {
                base_url: var("AGENTIC_AI_BASE_URL", DEFAULT_BASE_URL),
                timeout: Duration::from_secs(timeout_secs),
            },
            cache: CacheConfig {
                min_ttl: Duration::from_secs(min_ttl_secs),
                max_ttl: Duration::from_secs(max_ttl_secs),
                sweep_every,
            },
            api_keys: parse_api_keys(&var("API_KEYS", "")),
            json_logging: var("RUST_LOG_FORMAT", "").eq_ignore_ascii_case("json"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.agentic.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.agentic.timeout, Duration::from_secs(120));
        assert_eq!(config.cache.min_ttl, Duration::from_secs(15 * 60));
        assert_eq!(config.cache.max_ttl, Duration::from_secs(30 * 60));
        assert_eq!(config.cache.sweep_every, 100);
        assert!(config.api_keys.is_empty());
        assert!(!config.json_logging);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("AGENTIC_AI_BASE_URL", "https://agentic.internal"),
            ("INTEL_CACHE_MIN_TTL_SECS", "60"),
            ("INTEL_CACHE_MAX_TTL_SECS", "120"),
            ("API_KEYS", "k1:admin,k2:viewer"),
            ("RUST_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.agentic.base_url, "https://agentic.internal");
        assert_eq!(config.cache.max_ttl, Duration::from_secs(120));
        assert_eq!(config.api_keys.len(), 2);
        assert!(config.json_logging);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ServerConfig::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
        assert!(ServerConfig::from_lookup(lookup_from(&[
            ("INTEL_CACHE_MIN_TTL_SECS", "600"),
            ("INTEL_CACHE_MAX_TTL_SECS", "60"),
        ]))
        .is_err());
    }
}
