use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::types::identifiers::TokenId;

/// Shape of one slice: `texts` rows padded to `positions` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchShape {
    pub texts: usize,
    pub positions: usize,
}

impl BatchShape {
    pub fn new(texts: usize, positions: usize) -> Self {
        Self { texts, positions }
    }
}

/// Token ids of a padded batch, paired 1:1 with its validity mask.
///
/// `mask[[n, l]]` is true for content tokens (noise-eligible) and false for
/// padding or special tokens, which must come out of sanitization unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub ids: Array2<TokenId>,
    pub mask: Array2<bool>,
}

impl EncodedBatch {
    pub fn shape(&self) -> BatchShape {
        let (texts, positions) = self.ids.dim();
        BatchShape { texts, positions }
    }

    pub fn is_aligned(&self) -> bool {
        self.ids.dim() == self.mask.dim()
    }

    pub fn mask_rows(&self) -> Vec<Vec<bool>> {
        self.mask.outer_iter().map(|row| row.to_vec()).collect()
    }
}
