use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum Euclidean distance at which two embeddings still count as the
/// same person. 0.6 balances false positives against missed matches for
/// 128-dimensional encoders; stricter deployments go down to 0.4–0.5,
/// lenient ones up to 0.7–0.8.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Embedding length produced by the default encoder.
pub const DEFAULT_EMBEDDING_LEN: usize = 128;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("match threshold must be positive and finite, got {0}")]
    InvalidThreshold(f64),
    #[error("embedding length must be non-zero")]
    ZeroEmbeddingLen,
}

/// Matching configuration, fixed at service construction.
///
/// Fields are private so a validated config cannot be mutated afterwards;
/// every matching operation reads the same values for the life of the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    embedding_len: usize,
    threshold: f64,
}

impl MatchConfig {
    pub fn new(embedding_len: usize, threshold: f64) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if embedding_len == 0 {
            return Err(ConfigError::ZeroEmbeddingLen);
        }
        Ok(Self {
            embedding_len,
            threshold,
        })
    }

    pub fn embedding_len(&self) -> usize {
        self.embedding_len
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            embedding_len: DEFAULT_EMBEDDING_LEN,
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}
