//! Runtime configuration
//!
//! Read once from the environment at startup: plain `std::env::var` with
//! sensible defaults. API keys are optional; when a key
//! is absent the default registry falls back to fixture providers so the
//! orchestrator stays exercisable offline.

use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the history log
    pub data_dir: PathBuf,
    /// Directory holding generated report artifacts
    pub reports_dir: PathBuf,
    /// Upper bound on one whole dispatch
    pub global_deadline: Duration,
    /// Default per-provider call budget
    pub provider_timeout: Duration,
    /// Default retry budget for transient provider failures
    pub max_retries: u32,
    /// Cap on concurrent provider calls within one dispatch (None = up to
    /// provider count)
    pub max_concurrency: Option<usize>,
    /// First retry delay; doubles on each subsequent attempt
    pub backoff_base: Duration,
    pub hibp_api_key: Option<String>,
    pub ipinfo_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            reports_dir: PathBuf::from("./reports"),
            global_deadline: Duration::from_secs(15),
            provider_timeout: Duration::from_secs(5),
            max_retries: 2,
            max_concurrency: None,
            backoff_base: Duration::from_millis(250),
            hibp_api_key: None,
            ipinfo_token: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            data_dir: std::env::var("GODEYE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            reports_dir: std::env::var("GODEYE_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            global_deadline: env_millis("GODEYE_GLOBAL_DEADLINE_MS")
                .unwrap_or(defaults.global_deadline),
            provider_timeout: env_millis("GODEYE_PROVIDER_TIMEOUT_MS")
                .unwrap_or(defaults.provider_timeout),
            max_retries: std::env::var("GODEYE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            max_concurrency: std::env::var("GODEYE_MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok()),
            backoff_base: env_millis("GODEYE_BACKOFF_BASE_MS").unwrap_or(defaults.backoff_base),
            hibp_api_key: non_empty_env("HIBP_API_KEY"),
            ipinfo_token: non_empty_env("IPINFO_TOKEN"),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
