use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Epsilon;

/// Pipeline stage an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Sanitized token ids, per slice and merged.
    Ids,
    /// Decoded sanitized text.
    Text,
    /// Validity mask of the encoded corpus; ε-independent.
    Mask,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ids => "ids",
            Stage::Text => "text",
            Stage::Mask => "mask",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Part {
    Index(u32),
    Full,
}

impl Part {
    fn file_stem(&self) -> String {
        match self {
            Part::Index(i) => format!("part_{i:04}"),
            Part::Full => "full".to_string(),
        }
    }

    fn from_file_stem(stem: &str) -> Option<Self> {
        if stem == "full" {
            return Some(Part::Full);
        }
        stem.strip_prefix("part_")?.parse().ok().map(Part::Index)
    }
}

/// Key of one artifact: `(stage, ε, part_index | full)`.
///
/// ε is absent only for shared, ε-independent artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub stage: Stage,
    pub epsilon: Option<Epsilon>,
    pub part: Part,
}

impl ArtifactKey {
    pub fn slice(stage: Stage, epsilon: Epsilon, part_index: u32) -> Self {
        Self {
            stage,
            epsilon: Some(epsilon),
            part: Part::Index(part_index),
        }
    }

    pub fn merged(stage: Stage, epsilon: Epsilon) -> Self {
        Self {
            stage,
            epsilon: Some(epsilon),
            part: Part::Full,
        }
    }

    pub fn shared(stage: Stage) -> Self {
        Self {
            stage,
            epsilon: None,
            part: Part::Full,
        }
    }

    pub fn prefix(&self) -> KeyPrefix {
        KeyPrefix {
            stage: self.stage,
            epsilon: self.epsilon,
        }
    }

    pub fn part_index(&self) -> Option<u32> {
        match self.part {
            Part::Index(i) => Some(i),
            Part::Full => None,
        }
    }

    /// Location relative to a store root, e.g. `ids/epsi5/part_0003.json`.
    pub fn relative_path(&self) -> PathBuf {
        self.prefix()
            .relative_dir()
            .join(format!("{}.json", self.part.file_stem()))
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix(), self.part.file_stem())
    }
}

/// All keys sharing a stage and ε.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    pub stage: Stage,
    pub epsilon: Option<Epsilon>,
}

impl KeyPrefix {
    pub fn new(stage: Stage, epsilon: Epsilon) -> Self {
        Self {
            stage,
            epsilon: Some(epsilon),
        }
    }

    pub fn contains(&self, key: &ArtifactKey) -> bool {
        key.stage == self.stage && key.epsilon == self.epsilon
    }

    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(self.stage.as_str()).join(self.scope())
    }

    /// Rebuild a key under this prefix from a stored file name.
    pub fn key_for_file(&self, file_name: &str) -> Option<ArtifactKey> {
        let stem = file_name.strip_suffix(".json")?;
        Some(ArtifactKey {
            stage: self.stage,
            epsilon: self.epsilon,
            part: Part::from_file_stem(stem)?,
        })
    }

    fn scope(&self) -> String {
        match self.epsilon {
            Some(eps) => format!("epsi{eps}"),
            None => "shared".to_string(),
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage.as_str(), self.scope())
    }
}
