use thiserror::Error;

use crate::pipeline::error::PipelineError;
use crate::store::{
    Artifact, ArtifactKey, ArtifactStore, KeyPrefix, PersistenceError, RetryPolicy, SliceArtifact,
    Stage, StoreError,
};
use crate::types::{ContentDigest, Epsilon, TokenId};

/// The slice artifacts of an ε do not form a complete, contiguous cover of
/// the corpus. Nothing is merged and nothing is deleted.
#[derive(Debug, Error, PartialEq)]
pub enum IncompleteMergeError {
    #[error("epsilon {epsilon}: expected parts 0..{expected}, missing {missing:?}, unexpected {unexpected:?}")]
    Parts {
        epsilon: Epsilon,
        expected: u32,
        missing: Vec<u32>,
        unexpected: Vec<u32>,
    },
    #[error("epsilon {epsilon}: artifact for part {part_index} records part {recorded}")]
    PartMismatch {
        epsilon: Epsilon,
        part_index: u32,
        recorded: u32,
    },
    #[error("epsilon {epsilon}: part {part_index} starts at row {found}, expected {expected}")]
    RowGap {
        epsilon: Epsilon,
        part_index: u32,
        expected: usize,
        found: usize,
    },
    #[error("epsilon {epsilon}: merged {found} rows, corpus has {expected}")]
    RowCount {
        epsilon: Epsilon,
        expected: usize,
        found: usize,
    },
}

/// Rows of a verified merge and the slice keys it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSlices {
    pub part_keys: Vec<ArtifactKey>,
    pub rows: Vec<Vec<TokenId>>,
}

/// List the slice keys of `epsilon` and require exactly parts
/// `0..expected_parts`, returned in part order whatever the listing order.
pub fn verified_part_keys<S: ArtifactStore + ?Sized>(
    store: &S,
    retry: &RetryPolicy,
    epsilon: Epsilon,
    expected_parts: u32,
) -> Result<Vec<ArtifactKey>, PipelineError> {
    let prefix = KeyPrefix::new(Stage::Ids, epsilon);
    let mut keys: Vec<ArtifactKey> = retry
        .run(format!("list {prefix}"), || store.list(&prefix))?
        .into_iter()
        .filter(|key| key.part_index().is_some())
        .collect();
    keys.sort();

    let found: Vec<u32> = keys.iter().filter_map(ArtifactKey::part_index).collect();
    let complete = found.len() == expected_parts as usize
        && found.iter().zip(0..expected_parts).all(|(&a, b)| a == b);
    if !complete {
        let missing = (0..expected_parts).filter(|i| !found.contains(i)).collect();
        let unexpected = found.iter().copied().filter(|&i| i >= expected_parts).collect();
        return Err(IncompleteMergeError::Parts {
            epsilon,
            expected: expected_parts,
            missing,
            unexpected,
        }
        .into());
    }
    Ok(keys)
}

/// Read back every slice of `epsilon` in part order and concatenate them.
///
/// Must only be called once all slice writes of the ε have completed.
pub fn merge_slices<S: ArtifactStore + ?Sized>(
    store: &S,
    retry: &RetryPolicy,
    epsilon: Epsilon,
    expected_parts: u32,
    expected_rows: usize,
) -> Result<MergedSlices, PipelineError> {
    let part_keys = verified_part_keys(store, retry, epsilon, expected_parts)?;

    let mut rows = Vec::with_capacity(expected_rows);
    for key in &part_keys {
        let slice = read_slice(store, retry, key)?;
        let part_index = key.part_index().unwrap_or_default();
        if slice.part_index != part_index {
            return Err(IncompleteMergeError::PartMismatch {
                epsilon,
                part_index,
                recorded: slice.part_index,
            }
            .into());
        }
        if slice.first_row != rows.len() {
            return Err(IncompleteMergeError::RowGap {
                epsilon,
                part_index,
                expected: rows.len(),
                found: slice.first_row,
            }
            .into());
        }
        rows.extend(slice.ids);
    }

    if rows.len() != expected_rows {
        return Err(IncompleteMergeError::RowCount {
            epsilon,
            expected: expected_rows,
            found: rows.len(),
        }
        .into());
    }
    Ok(MergedSlices { part_keys, rows })
}

pub fn read_slice<S: ArtifactStore + ?Sized>(
    store: &S,
    retry: &RetryPolicy,
    key: &ArtifactKey,
) -> Result<SliceArtifact, PersistenceError> {
    retry.run(format!("get {key}"), || match store.get(key)? {
        Artifact::Slice(slice) => Ok(slice),
        other => Err(unexpected_kind(key, "slice", &other)),
    })
}

/// Merged rows together with the fingerprint they were computed from.
pub fn read_ids<S: ArtifactStore + ?Sized>(
    store: &S,
    retry: &RetryPolicy,
    key: &ArtifactKey,
) -> Result<(ContentDigest, Vec<Vec<TokenId>>), PersistenceError> {
    retry.run(format!("get {key}"), || match store.get(key)? {
        Artifact::Ids { source, rows } => Ok((source, rows)),
        other => Err(unexpected_kind(key, "ids", &other)),
    })
}

fn unexpected_kind(key: &ArtifactKey, expected: &'static str, found: &Artifact) -> StoreError {
    StoreError::UnexpectedKind {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}
