//! Process-level configuration, read from the environment.
//!
//! This core persists nothing of its own, so there is no config file
//! layer here — just the env vars a deployer sets, with the same
//! defaults the original service shipped.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::SourceID;
use crate::error::Error;

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub wrf_smn_enabled: bool,
    pub wrf_smn_cache_ttl: Duration,
    pub windy_point_forecast_api_key: Option<String>,
    pub max_parallelism: usize,
    pub http_timeout: Duration,
    pub breaker_settings: HashMap<SourceID, BreakerSettings>,
    pub retry: RetrySettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wrf_smn_enabled: false,
            wrf_smn_cache_ttl: Duration::from_secs(3 * 3600),
            windy_point_forecast_api_key: None,
            max_parallelism: 4,
            http_timeout: Duration::from_secs(10),
            breaker_settings: HashMap::new(),
            retry: RetrySettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn breaker_settings_for(&self, source: SourceID) -> BreakerSettings {
        self.breaker_settings
            .get(&source)
            .cloned()
            .unwrap_or_default()
    }

    /// Loads configuration from the environment, falling back to
    /// `EngineConfig::default()` values where a variable is unset.
    /// A *present but malformed* numeric override is a configuration
    /// error, surfaced eagerly rather than silently ignored.
    pub fn from_env() -> Result<Self, Error> {
        let defaults = EngineConfig::default();

        let wrf_smn_enabled = env_bool("WRF_SMN_ENABLED", defaults.wrf_smn_enabled)?;
        let wrf_smn_cache_ttl = Duration::from_secs(
            env_u64(
                "WRF_SMN_CACHE_TTL_HOURS",
                defaults.wrf_smn_cache_ttl.as_secs() / 3600,
            )? * 3600,
        );
        let windy_point_forecast_api_key = std::env::var("WINDY_POINT_FORECAST_API_KEY").ok();
        let max_parallelism =
            env_u64("MAX_PARALLELISM", defaults.max_parallelism as u64)? as usize;
        let http_timeout =
            Duration::from_secs(env_u64("HTTP_TIMEOUT_SECONDS", defaults.http_timeout.as_secs())?);

        let retry = RetrySettings {
            max_attempts: env_u64("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts as u64)?
                as u32,
            initial_delay: Duration::from_millis(env_u64(
                "RETRY_INITIAL_DELAY_MS",
                defaults.retry.initial_delay.as_millis() as u64,
            )?),
            multiplier: env_f64("RETRY_MULTIPLIER", defaults.retry.multiplier)?,
            max_delay: Duration::from_millis(env_u64(
                "RETRY_MAX_DELAY_MS",
                defaults.retry.max_delay.as_millis() as u64,
            )?),
        };

        Ok(EngineConfig {
            wrf_smn_enabled,
            wrf_smn_cache_ttl,
            windy_point_forecast_api_key,
            max_parallelism,
            http_timeout,
            breaker_settings: HashMap::new(),
            retry,
        })
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, Error> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(Error::Config(format!("{key}: invalid boolean '{other}'"))),
        },
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, Error> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key}: invalid integer '{v}'"))),
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64, Error> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key}: invalid number '{v}'"))),
    }
}
