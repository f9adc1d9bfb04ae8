//! Pipeline configuration.
//!
//! Stage clients never read the environment themselves; the binary builds a
//! [`PipelineConfig`] once (usually via [`PipelineConfig::from_env`]) and
//! hands it to the constructors.

use std::env;
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_VISION_URL: &str = "http://localhost:8001";
const DEFAULT_INTERPRETATION_URL: &str = "http://localhost:8002";
const DEFAULT_VISION_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_INTERPRETATION_TIMEOUT: Duration = Duration::from_secs(240);
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Endpoints, per-stage timeouts and request limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Base URL of the vision service (`/analyze`, `/health`)
    pub vision_base_url: String,
    /// Base URL of the interpretation service (`/interpret`, `/health`)
    pub interpretation_base_url: String,
    pub vision_timeout: Duration,
    pub interpretation_timeout: Duration,
    /// Budget for a single `/health` probe
    pub health_timeout: Duration,
    /// Upper bound for each uploaded image
    pub max_image_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vision_base_url: DEFAULT_VISION_URL.to_string(),
            interpretation_base_url: DEFAULT_INTERPRETATION_URL.to_string(),
            vision_timeout: DEFAULT_VISION_TIMEOUT,
            interpretation_timeout: DEFAULT_INTERPRETATION_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, falling back to
    /// defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            vision_base_url: lookup("VISION_BASE_URL").unwrap_or(defaults.vision_base_url),
            interpretation_base_url: lookup("INTERPRETATION_BASE_URL")
                .unwrap_or(defaults.interpretation_base_url),
            vision_timeout: seconds(&lookup, "VISION_TIMEOUT_SECS")?
                .unwrap_or(defaults.vision_timeout),
            interpretation_timeout: seconds(&lookup, "INTERPRETATION_TIMEOUT_SECS")?
                .unwrap_or(defaults.interpretation_timeout),
            health_timeout: seconds(&lookup, "HEALTH_TIMEOUT_SECS")?
                .unwrap_or(defaults.health_timeout),
            max_image_bytes: parse(&lookup, "MAX_IMAGE_BYTES")?
                .unwrap_or(defaults.max_image_bytes),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("vision_base_url", &self.vision_base_url),
            ("interpretation_base_url", &self.interpretation_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("{} must be an http(s) URL, got '{}'", name, url)));
            }
        }
        for (name, timeout) in [
            ("vision_timeout", self.vision_timeout),
            ("interpretation_timeout", self.interpretation_timeout),
            ("health_timeout", self.health_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.max_image_bytes == 0 {
            return Err(Error::Config("max_image_bytes must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn vision_url(&self, path: &str) -> String {
        endpoint(&self.vision_base_url, path)
    }

    pub fn interpretation_url(&self, path: &str) -> String {
        endpoint(&self.interpretation_base_url, path)
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{}='{}': {}", key, raw, e)))
        })
        .transpose()
}

fn seconds<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    parse::<F, f64>(lookup, key)?
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| Error::Config(format!("{}={} is not a valid duration: {}", key, secs, e)))
        })
        .transpose()
}
