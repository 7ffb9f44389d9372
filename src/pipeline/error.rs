use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mechanism::MechanismError;
use crate::pipeline::config::ConfigError;
use crate::pipeline::merge::IncompleteMergeError;
use crate::store::PersistenceError;
use crate::types::Epsilon;
use crate::vocabulary::ProviderError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Mechanism error: {0}")]
    Mechanism(#[from] MechanismError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Incomplete merge: {0}")]
    IncompleteMerge(#[from] IncompleteMergeError),
    /// A failure inside one ε that would recur at every ε.
    #[error("Run aborted: {0}")]
    Aborted(#[source] Box<StepFailure>),
}

/// Step of one ε run that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedStep {
    /// Checking for or tidying up an already merged ε.
    Resume,
    Slice { part_index: u32 },
    Merge,
    Cleanup,
    Decode,
    /// Writing the decoded text.
    PersistText,
}

impl fmt::Display for FailedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedStep::Resume => f.write_str("resume"),
            FailedStep::Slice { part_index } => write!(f, "slice {part_index}"),
            FailedStep::Merge => f.write_str("merge"),
            FailedStep::Cleanup => f.write_str("cleanup"),
            FailedStep::Decode => f.write_str("decode"),
            FailedStep::PersistText => f.write_str("persist text"),
        }
    }
}

/// Failure of one ε run. Other ε values are unaffected.
#[derive(Debug, Error)]
#[error("epsilon {epsilon}: {step} failed: {source}")]
pub struct StepFailure {
    pub epsilon: Epsilon,
    pub step: FailedStep,
    #[source]
    pub source: PipelineError,
}

impl StepFailure {
    pub fn new(epsilon: Epsilon, step: FailedStep, source: impl Into<PipelineError>) -> Self {
        Self {
            epsilon,
            step,
            source: source.into(),
        }
    }

    /// Whether the embedding or tokenizer provider failed.
    pub fn is_provider(&self) -> bool {
        matches!(self.source, PipelineError::Provider(_))
    }
}
