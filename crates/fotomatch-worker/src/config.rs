use std::time::Duration;

use fotomatch_core::config::ConfigError;
use fotomatch_core::{MatchConfig, DEFAULT_EMBEDDING_LEN, DEFAULT_MATCH_THRESHOLD};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Worker configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Threshold and embedding length shared with the matching pipeline.
    pub match_config: MatchConfig,
    /// How long to sleep when the job queue is empty.
    pub poll_interval: Duration,
}

impl WorkerConfig {
    /// Load configuration from `FOTOMATCH_*` environment variables with
    /// defaults. Threshold and embedding length go through
    /// [`MatchConfig::new`], so an invalid value is a construction error,
    /// not a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let threshold = env_f64("FOTOMATCH_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD);
        let embedding_len = env_usize("FOTOMATCH_EMBEDDING_LEN", DEFAULT_EMBEDDING_LEN);
        let poll_interval_ms = env_u64("FOTOMATCH_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS);

        Ok(Self {
            match_config: MatchConfig::new(embedding_len, threshold)?,
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
