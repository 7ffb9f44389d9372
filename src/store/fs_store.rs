use std::fs;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use crate::store::artifact::{Artifact, StoredArtifact};
use crate::store::key::{ArtifactKey, KeyPrefix};
use crate::store::store::{ArtifactStore, StoreError};

/// Artifact store rooted at a directory, one JSON file per key.
///
/// Writes go to a sibling temp file which is synced and then renamed over
/// the target, and the directory is synced after the rename, so a key is
/// either absent or complete.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.path_of(key);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;
        let envelope = StoredArtifact::seal(key, artifact)?;

        let temp_path = path.with_extension("json.tmp");
        let f = fs::File::create(&temp_path)?;
        serde_json::to_writer(&f, &envelope)?;
        f.sync_all()?;

        fs::rename(&temp_path, &path)?;
        // the new directory entry must survive a crash too
        sync_dir(parent)?;
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<Artifact, StoreError> {
        let path = self.path_of(key);
        let f = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let envelope: StoredArtifact = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        envelope.open(key)
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        match fs::metadata(self.path_of(key)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &KeyPrefix) -> Result<Vec<ArtifactKey>, StoreError> {
        let dir = self.root.join(prefix.relative_dir());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            // temp files of in-flight or crashed writes end in .tmp and never parse
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|name| prefix.key_for_file(name)) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn delete(&self, key: &ArtifactKey) -> Result<(), StoreError> {
        match fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
