use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

use crate::types::TokenId;
use crate::vocabulary::provider::{EmbeddingProvider, ProviderError};

/// V×D embedding matrix, row `v` being the embedding of token id `v`.
///
/// Immutable once built; shared read-only by every worker of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
    rows: Array2<f32>,
}

impl EmbeddingTable {
    pub fn new(rows: Array2<f32>) -> Self {
        Self { rows }
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, ProviderError> {
        let dimension = rows.first().map_or(0, Vec::len);
        let vocabulary_size = rows.len();
        let mut flat = Vec::with_capacity(vocabulary_size * dimension);
        for (id, row) in rows.into_iter().enumerate() {
            if row.len() != dimension {
                return Err(ProviderError::RowDimension {
                    id: id as TokenId,
                    expected: dimension,
                    found: row.len(),
                });
            }
            flat.extend(row);
        }
        let rows = Array2::from_shape_vec((vocabulary_size, dimension), flat)
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(Self { rows })
    }

    /// Copy the whole vocabulary out of a provider. Done once per run.
    pub fn load(provider: &dyn EmbeddingProvider) -> Result<Self, ProviderError> {
        let vocabulary_size = provider.vocabulary_size();
        let dimension = provider.dimension();
        let mut rows = Array2::<f32>::zeros((vocabulary_size, dimension));
        for (id, mut target) in rows.outer_iter_mut().enumerate() {
            let id = id as TokenId;
            let embedding = provider.embedding_of(id)?;
            if embedding.len() != dimension {
                return Err(ProviderError::RowDimension {
                    id,
                    expected: dimension,
                    found: embedding.len(),
                });
            }
            target.assign(&ArrayView1::from(&embedding[..]));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> ArrayView2<'_, f32> {
        self.rows.view()
    }

    pub fn row(&self, id: TokenId) -> Option<ArrayView1<'_, f32>> {
        let index = id as usize;
        (index < self.rows.nrows()).then(|| self.rows.row(index))
    }

    /// Look up a padded id batch, producing an (N, L, D) embedding batch.
    pub fn embed(&self, ids: ArrayView2<'_, TokenId>) -> Result<Array3<f32>, ProviderError> {
        let (texts, positions) = ids.dim();
        let mut out = Array3::<f32>::zeros((texts, positions, self.dimension()));
        for (mut text_out, text_ids) in out.outer_iter_mut().zip(ids.outer_iter()) {
            for (mut target, &id) in text_out.axis_iter_mut(Axis(0)).zip(text_ids.iter()) {
                let row = self.row(id).ok_or(ProviderError::UnknownToken {
                    id,
                    vocabulary_size: self.vocabulary_size(),
                })?;
                target.assign(&row);
            }
        }
        Ok(out)
    }
}

impl EmbeddingProvider for EmbeddingTable {
    fn vocabulary_size(&self) -> usize {
        self.rows.nrows()
    }

    fn dimension(&self) -> usize {
        self.rows.ncols()
    }

    fn embedding_of(&self, token_id: TokenId) -> Result<Vec<f32>, ProviderError> {
        self.row(token_id)
            .map(|row| row.to_vec())
            .ok_or(ProviderError::UnknownToken {
                id: token_id,
                vocabulary_size: self.vocabulary_size(),
            })
    }
}
