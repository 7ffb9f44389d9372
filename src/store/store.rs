use thiserror::Error;

use crate::store::artifact::Artifact;
use crate::store::key::{ArtifactKey, KeyPrefix};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("Artifact {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("Artifact {key} has kind {found}, expected {expected}")]
    UnexpectedKind {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl StoreError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Io(e) => e.kind() != std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Durable keyed storage for slice, merged and shared artifacts.
///
/// A completed `put` must be visible to every later `get`/`list` from the
/// same process. Distinct keys may be written concurrently.
pub trait ArtifactStore: Send + Sync {
    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), StoreError>;

    /// Fails with `NotFound` if the key was never written or was deleted.
    fn get(&self, key: &ArtifactKey) -> Result<Artifact, StoreError>;

    fn contains(&self, key: &ArtifactKey) -> Result<bool, StoreError>;

    /// Keys under `prefix`, in no particular order.
    fn list(&self, prefix: &KeyPrefix) -> Result<Vec<ArtifactKey>, StoreError>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &ArtifactKey) -> Result<(), StoreError>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for std::sync::Arc<S> {
    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), StoreError> {
        (**self).put(key, artifact)
    }

    fn get(&self, key: &ArtifactKey) -> Result<Artifact, StoreError> {
        (**self).get(key)
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        (**self).contains(key)
    }

    fn list(&self, prefix: &KeyPrefix) -> Result<Vec<ArtifactKey>, StoreError> {
        (**self).list(prefix)
    }

    fn delete(&self, key: &ArtifactKey) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}
