use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::CollectorError;

pub const DEFAULT_CONFIG_FILE: &str = "osh-collector.json";
pub const DEFAULT_BASE_URL: &str = "https://api.osf.io/v2";

/// On-disk config; every field is optional and falls back to the defaults
/// in [`ResolvedConfig::default`].
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub input: Option<Utf8PathBuf>,
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
    #[serde(default)]
    pub checkpoint: Option<Utf8PathBuf>,
    #[serde(default)]
    pub failures: Option<Utf8PathBuf>,
    #[serde(default)]
    pub request_interval_ms: Option<u64>,
    #[serde(default)]
    pub checkpoint_every: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub keep_checkpoint: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub input: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub checkpoint: Utf8PathBuf,
    pub failures: Utf8PathBuf,
    pub request_interval: Duration,
    pub checkpoint_every: usize,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub max_depth: usize,
    pub keep_checkpoint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Linear backoff: `base * (attempt + 1)`.
    pub fn delay(&self, attempt: usize) -> Duration {
        self.base_delay * (attempt as u32 + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            input: Utf8PathBuf::from("osf_links.txt"),
            output: Utf8PathBuf::from("osf_metadata_final.json"),
            checkpoint: Utf8PathBuf::from("osf_metadata_progress.json"),
            failures: Utf8PathBuf::from("osf_metadata_failures.json"),
            request_interval: Duration::from_secs(2),
            checkpoint_every: 5,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            max_depth: 10,
            keep_checkpoint: false,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `osh-collector.json` from the working directory when
    /// no path is given. A missing default file yields the built-in defaults.
    pub fn resolve(path: Option<&Utf8Path>) -> Result<ResolvedConfig, CollectorError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| CollectorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CollectorError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let defaults = ResolvedConfig::default();
        ResolvedConfig {
            base_url: config.base_url.unwrap_or(defaults.base_url),
            input: config.input.unwrap_or(defaults.input),
            output: config.output.unwrap_or(defaults.output),
            checkpoint: config.checkpoint.unwrap_or(defaults.checkpoint),
            failures: config.failures.unwrap_or(defaults.failures),
            request_interval: config
                .request_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_interval),
            checkpoint_every: config
                .checkpoint_every
                .unwrap_or(defaults.checkpoint_every)
                .max(1),
            retry: RetryPolicy {
                max_retries: config.max_retries.unwrap_or(defaults.retry.max_retries),
                base_delay: config
                    .retry_base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_delay),
            },
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_depth: config.max_depth.unwrap_or(defaults.max_depth),
            keep_checkpoint: config.keep_checkpoint.unwrap_or(defaults.keep_checkpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default());
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.request_interval, Duration::from_secs(2));
        assert_eq!(resolved.checkpoint_every, 5);
    }

    #[test]
    fn checkpoint_every_is_clamped() {
        let config = Config {
            checkpoint_every: Some(0),
            ..Config::default()
        };
        assert_eq!(ConfigLoader::resolve_config(config).checkpoint_every, 1);
    }

    #[test]
    fn retry_delay_is_linear() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(600));
    }
}
