use serde::{Deserialize, Serialize};

use crate::pipeline::error::FailedStep;
use crate::types::{ContentDigest, Epsilon};

/// What happened to one ε of the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpsilonOutcome {
    Completed {
        parts: u32,
        rows: usize,
        /// Slices taken from an earlier, interrupted run.
        reused_parts: u32,
    },
    Skipped {
        /// The merged text was missing and was decoded again from the ids.
        text_regenerated: bool,
    },
    Failed {
        step: FailedStep,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpsilonReport {
    pub epsilon: Epsilon,
    #[serde(flatten)]
    pub outcome: EpsilonOutcome,
}

/// Per-ε result of one pipeline run, in ladder order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub corpus_digest: ContentDigest,
    pub texts: usize,
    pub epsilons: Vec<EpsilonReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EpsilonReport> {
        self.epsilons
            .iter()
            .filter(|r| matches!(r.outcome, EpsilonOutcome::Failed { .. }))
    }

    pub fn outcome(&self, epsilon: Epsilon) -> Option<&EpsilonOutcome> {
        self.epsilons
            .iter()
            .find(|r| r.epsilon == epsilon)
            .map(|r| &r.outcome)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
