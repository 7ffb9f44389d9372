pub mod artifact;
pub mod fs_store;
pub mod key;
pub mod memory;
pub mod retry;
pub mod store;

pub use artifact::{Artifact, SliceArtifact, StoredArtifact};
pub use fs_store::FsArtifactStore;
pub use key::{ArtifactKey, KeyPrefix, Part, Stage};
pub use memory::MemoryArtifactStore;
pub use retry::{PersistenceError, RetryPolicy};
pub use store::{ArtifactStore, StoreError};
