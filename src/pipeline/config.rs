use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::RetryPolicy;
use crate::types::{Epsilon, InvalidEpsilon};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Epsilon ladder is empty")]
    EmptyLadder,
    #[error(transparent)]
    InvalidEpsilon(#[from] InvalidEpsilon),
    #[error("Epsilon {0} appears more than once in the ladder")]
    DuplicateEpsilon(Epsilon),
    #[error("Slice width must be positive")]
    ZeroSliceWidth,
    #[error("Worker pool width must be positive")]
    ZeroWorkers,
    #[error("Retry limit must allow at least one attempt")]
    ZeroRetryLimit,
    #[error("Vocabulary is empty")]
    EmptyVocabulary,
    #[error("Dimension mismatch: expected {expected}, vocabulary has {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Worker pool could not be built: {0}")]
    WorkerPool(String),
}

/// What to do with an ε whose merged artifact already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Leave it untouched and skip all of its slices.
    SkipCompleted,
    /// Sample fresh noise and overwrite it.
    Recompute,
}

// Key point:
// Serializable
// Comparable
// Explicit defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub epsilons: Vec<f64>,
    /// Texts per slice; bounds peak tensor memory.
    pub slice_width: usize,
    /// Slices of one ε processed concurrently.
    pub workers: usize,
    pub retry: RetryPolicy,
    pub resume: ResumePolicy,
    /// Expected embedding dimension, when pinned to a known model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

impl PipelineConfig {
    /// The ladder `{1, 5, 10, …, 100}` over slices of 1000 texts.
    pub fn v0() -> Self {
        let mut epsilons = vec![1.0];
        epsilons.extend((5..=100).step_by(5).map(f64::from));
        Self {
            epsilons,
            slice_width: 1000,
            workers: 1,
            retry: RetryPolicy::new(3, Duration::from_millis(50)),
            resume: ResumePolicy::SkipCompleted,
            dimension: None,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let f = fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(f))?)
    }

    /// Check every field and return the ladder in ascending order.
    pub fn validate(&self) -> Result<EpsilonLadder, ConfigError> {
        if self.slice_width == 0 {
            return Err(ConfigError::ZeroSliceWidth);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.retry.limit == 0 {
            return Err(ConfigError::ZeroRetryLimit);
        }
        EpsilonLadder::new(&self.epsilons)
    }
}

/// Distinct ε values in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpsilonLadder(Vec<Epsilon>);

impl EpsilonLadder {
    pub fn new(values: &[f64]) -> Result<Self, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }
        let mut seen = BTreeSet::new();
        for &value in values {
            let epsilon = Epsilon::new(value)?;
            if !seen.insert(epsilon) {
                return Err(ConfigError::DuplicateEpsilon(epsilon));
            }
        }
        Ok(EpsilonLadder(seen.into_iter().collect()))
    }

    pub fn as_slice(&self) -> &[Epsilon] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
