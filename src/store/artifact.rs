use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::key::ArtifactKey;
use crate::store::store::StoreError;
use crate::types::{ContentDigest, TokenId};

/// Sanitized ids of one slice for one ε.
///
/// `first_row` and `input_digest` tie the artifact to the exact encoded
/// slice it was computed from; a restart reuses it only if both match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceArtifact {
    pub part_index: u32,
    pub first_row: usize,
    pub input_digest: ContentDigest,
    pub ids: Vec<Vec<TokenId>>,
}

/// Payload of a stored artifact.
///
/// Merged ids and the mask carry `source`, the fingerprint of the encoded
/// corpus they were computed from. A rerun keeps them only if it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Slice(SliceArtifact),
    Ids {
        source: ContentDigest,
        rows: Vec<Vec<TokenId>>,
    },
    Texts {
        texts: Vec<String>,
    },
    Mask {
        source: ContentDigest,
        rows: Vec<Vec<bool>>,
    },
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Slice(_) => "slice",
            Artifact::Ids { .. } => "ids",
            Artifact::Texts { .. } => "texts",
            Artifact::Mask { .. } => "mask",
        }
    }

    pub fn checksum(&self) -> Result<ContentDigest, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(ContentDigest::from_bytes(&bytes))
    }
}

/// On-disk envelope: the payload plus what is needed to trust it on read.
// created_at is informational only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact<A = Artifact> {
    pub key: String,
    pub checksum: ContentDigest,
    pub created_at: DateTime<Utc>,
    pub artifact: A,
}

impl<'a> StoredArtifact<&'a Artifact> {
    pub fn seal(key: &ArtifactKey, artifact: &'a Artifact) -> Result<Self, StoreError> {
        Ok(Self {
            key: key.to_string(),
            checksum: artifact.checksum()?,
            created_at: Utc::now(),
            artifact,
        })
    }
}

impl StoredArtifact {
    /// Check the envelope belongs to `key` and the payload hashes to the
    /// recorded checksum.
    pub fn open(self, key: &ArtifactKey) -> Result<Artifact, StoreError> {
        let expected_key = key.to_string();
        if self.key != expected_key {
            return Err(StoreError::Corrupt {
                key: expected_key,
                reason: format!("envelope is for {}", self.key),
            });
        }
        let actual = self.artifact.checksum()?;
        if actual != self.checksum {
            return Err(StoreError::Corrupt {
                key: expected_key,
                reason: format!(
                    "checksum mismatch: envelope says {}, payload hashes to {}",
                    self.checksum.as_str(),
                    actual.as_str(),
                ),
            });
        }
        Ok(self.artifact)
    }
}
