use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::api::normalize_base_url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "KTL-App/1.0";
pub const DEFAULT_TRACKING_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_LOCATION_PUSH_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub request_timeout: Duration,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub tracking_interval: Duration,
    pub location_push_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocoder_user_agent: DEFAULT_GEOCODER_USER_AGENT.to_string(),
            tracking_interval: Duration::from_millis(DEFAULT_TRACKING_INTERVAL_MS),
            location_push_interval: Duration::from_millis(DEFAULT_LOCATION_PUSH_INTERVAL_MS),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url: String = try_load(&lookup, "KTL_API_BASE_URL", DEFAULT_BASE_URL)?;
        let timeout_secs: u64 = try_load(&lookup, "KTL_REQUEST_TIMEOUT_SECS", "10")?;
        let tracking_ms: u64 = try_load(
            &lookup,
            "KTL_TRACKING_INTERVAL_MS",
            &DEFAULT_TRACKING_INTERVAL_MS.to_string(),
        )?;
        let push_ms: u64 = try_load(
            &lookup,
            "KTL_LOCATION_PUSH_INTERVAL_MS",
            &DEFAULT_LOCATION_PUSH_INTERVAL_MS.to_string(),
        )?;

        for (key, value) in [
            ("KTL_REQUEST_TIMEOUT_SECS", timeout_secs),
            ("KTL_TRACKING_INTERVAL_MS", tracking_ms),
            ("KTL_LOCATION_PUSH_INTERVAL_MS", push_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: "0".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(Self {
            base_url: normalize_base_url(&base_url),
            request_timeout: Duration::from_secs(timeout_secs),
            geocoder_url: try_load(&lookup, "KTL_GEOCODER_URL", DEFAULT_GEOCODER_URL)?,
            geocoder_user_agent: try_load(
                &lookup,
                "KTL_GEOCODER_USER_AGENT",
                DEFAULT_GEOCODER_USER_AGENT,
            )?,
            tracking_interval: Duration::from_millis(tracking_ms),
            location_push_interval: Duration::from_millis(push_ms),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    };
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}
