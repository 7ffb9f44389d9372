use ndarray::{Array2, ArrayView1, ArrayView3, Zip};

use crate::mechanism::error::{check_shape, MechanismError};
use crate::types::TokenId;
use crate::vocabulary::EmbeddingTable;

/// Exact nearest-neighbour projection back onto the vocabulary.
///
/// Brute force over all `V` rows: `O(V·D)` per position. Each text is scanned
/// vocabulary-row-major so a row is loaded once for all `L` positions of the
/// text. Equal distances resolve to the lowest token id.
#[derive(Debug, Clone, Copy)]
pub struct NearestNeighborProjector<'a> {
    vocabulary: &'a EmbeddingTable,
}

impl<'a> NearestNeighborProjector<'a> {
    pub fn new(vocabulary: &'a EmbeddingTable) -> Self {
        Self { vocabulary }
    }

    /// Project an (N, L, D) batch to an (N, L) matrix of token ids.
    pub fn project(
        &self,
        perturbed: ArrayView3<'_, f32>,
    ) -> Result<Array2<TokenId>, MechanismError> {
        let rows = self.vocabulary.rows();
        if rows.nrows() == 0 {
            return Err(MechanismError::EmptyVocabulary);
        }
        let (texts, positions, dimension) = perturbed.dim();
        check_shape("embedding dimension", &[rows.ncols()], &[dimension])?;

        let mut ids = Array2::<TokenId>::zeros((texts, positions));
        let mut best = vec![f32::INFINITY; positions];

        for (text, mut text_ids) in perturbed.outer_iter().zip(ids.outer_iter_mut()) {
            best.fill(f32::INFINITY);
            for (v, candidate) in rows.outer_iter().enumerate() {
                let targets = best.iter_mut().zip(text_ids.iter_mut());
                for (point, (slot, id)) in text.outer_iter().zip(targets) {
                    let distance = squared_distance(point, candidate);
                    // strict: the first (lowest) id wins ties
                    if distance < *slot {
                        *slot = distance;
                        *id = v as TokenId;
                    }
                }
            }
        }
        Ok(ids)
    }
}

/// Squared Euclidean distance; same argmin as the Euclidean distance.
pub fn squared_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    Zip::from(a).and(b).fold(0.0f32, |acc, &x, &y| {
        let d = x - y;
        acc + d * d
    })
}
