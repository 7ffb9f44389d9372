use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Index of a row in the vocabulary embedding table.
pub type TokenId = u32;

#[derive(Debug, Error, PartialEq)]
#[error("Epsilon must be positive and finite, got {0}")]
pub struct InvalidEpsilon(pub f64);

/// Privacy parameter of the dχ mechanism.
///
/// Always positive and finite, which makes the total order below sound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Epsilon(f64);

impl Epsilon {
    pub fn new(value: f64) -> Result<Self, InvalidEpsilon> {
        if value.is_finite() && value > 0.0 {
            Ok(Epsilon(value))
        } else {
            Err(InvalidEpsilon(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Scale of the Gamma magnitude distribution, `1 / ε`.
    pub fn gamma_scale(self) -> f64 {
        1.0 / self.0
    }
}

impl TryFrom<f64> for Epsilon {
    type Error = InvalidEpsilon;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Epsilon::new(value)
    }
}

impl From<Epsilon> for f64 {
    fn from(value: Epsilon) -> Self {
        value.0
    }
}

impl PartialEq for Epsilon {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Epsilon {}

impl PartialOrd for Epsilon {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Epsilon {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Epsilon {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Epsilon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of an input, `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn from_bytes(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        ContentDigest::finish(hasher)
    }

    /// Digest of a list of texts. Lengths are hashed so that boundaries count.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for text in texts {
            let bytes = text.as_ref().as_bytes();
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        ContentDigest::finish(hasher)
    }

    /// Digest of a padded token id matrix and its validity mask, shape
    /// included.
    pub fn from_encoded(ids: ArrayView2<'_, TokenId>, mask: ArrayView2<'_, bool>) -> Self {
        let mut hasher = Sha256::new();
        let (rows, cols) = ids.dim();
        hasher.update((rows as u64).to_le_bytes());
        hasher.update((cols as u64).to_le_bytes());
        for id in ids.iter() {
            hasher.update(id.to_le_bytes());
        }
        for &valid in mask.iter() {
            hasher.update([u8::from(valid)]);
        }
        ContentDigest::finish(hasher)
    }

    fn finish(hasher: Sha256) -> Self {
        let hex = hex::encode(hasher.finalize());
        ContentDigest(format!("sha256:{hex}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
