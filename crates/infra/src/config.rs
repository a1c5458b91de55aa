//! Engine configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PUBLISH_TOPIC: &str = "marketing.task.completed";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineConfigError {
    #[error("{var}: expected {expected}, got {value:?}")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime knobs for the issuance engine and its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Lifetime of an inventory hold before the sweeper may expire it.
    pub reservation_ttl: Duration,
    /// Upper bound on one webhook delivery.
    pub webhook_timeout: Duration,
    pub publish_topic: String,
    /// Upper bound on handing one completion message to the broker.
    pub publish_timeout: Duration,
    pub sweep_interval: Duration,
    /// Broker URL; `None` disables publishing.
    pub redis_url: Option<String>,
    /// JSON file with tasks, rewards and campaigns to seed in-memory stores.
    pub catalog_path: Option<PathBuf>,
    pub bind_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::from_secs(30 * 60),
            webhook_timeout: Duration::from_secs(10),
            publish_topic: DEFAULT_PUBLISH_TOPIC.to_string(),
            publish_timeout: Duration::from_secs(3),
            sweep_interval: Duration::from_secs(60),
            redis_url: None,
            catalog_path: None,
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, EngineConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables take
    /// their defaults; malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            reservation_ttl: duration_var(
                get("MARKETING_RESERVATION_TTL_SECS"),
                "MARKETING_RESERVATION_TTL_SECS",
                Duration::from_secs,
                defaults.reservation_ttl,
            )?,
            webhook_timeout: duration_var(
                get("MARKETING_WEBHOOK_TIMEOUT_MS"),
                "MARKETING_WEBHOOK_TIMEOUT_MS",
                Duration::from_millis,
                defaults.webhook_timeout,
            )?,
            publish_topic: get("MARKETING_PUBLISH_TOPIC").unwrap_or(defaults.publish_topic),
            publish_timeout: duration_var(
                get("MARKETING_PUBLISH_TIMEOUT_MS"),
                "MARKETING_PUBLISH_TIMEOUT_MS",
                Duration::from_millis,
                defaults.publish_timeout,
            )?,
            sweep_interval: duration_var(
                get("MARKETING_SWEEP_INTERVAL_SECS"),
                "MARKETING_SWEEP_INTERVAL_SECS",
                Duration::from_secs,
                defaults.sweep_interval,
            )?,
            redis_url: get("REDIS_URL"),
            catalog_path: get("MARKETING_CATALOG_PATH").map(PathBuf::from),
            bind_addr: get("MARKETING_BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    pub fn reservation_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.reservation_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(30))
    }
}

fn duration_var(
    raw: Option<String>,
    var: &'static str,
    unit: fn(u64) -> Duration,
    default: Duration,
) -> Result<Duration, EngineConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(unit(n)),
        _ => Err(EngineConfigError::InvalidValue {
            var,
            expected: "a positive integer",
            value: raw,
        }),
    }
}
