use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::store::artifact::{Artifact, StoredArtifact};
use crate::store::key::{ArtifactKey, KeyPrefix};
use crate::store::store::{ArtifactStore, StoreError};

/// In-process store holding the same serialized envelopes the filesystem
/// store writes. Lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<BTreeMap<ArtifactKey, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ArtifactKey, Vec<u8>>> {
        // a poisoned lock still holds whole envelopes; writes are single inserts
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<ArtifactKey, Vec<u8>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&StoredArtifact::seal(key, artifact)?)?;
        self.write().insert(*key, bytes);
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<Artifact, StoreError> {
        let guard = self.read();
        let bytes = guard
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let envelope: StoredArtifact = serde_json::from_slice(bytes)?;
        envelope.open(key)
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(key))
    }

    fn list(&self, prefix: &KeyPrefix) -> Result<Vec<ArtifactKey>, StoreError> {
        Ok(self.read().keys().filter(|k| prefix.contains(k)).copied().collect())
    }

    fn delete(&self, key: &ArtifactKey) -> Result<(), StoreError> {
        self.write().remove(key);
        Ok(())
    }
}
