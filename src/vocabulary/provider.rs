use thiserror::Error;

use crate::types::{EncodedBatch, TokenId};

/// Failures of the external embedding or tokenizer collaborators.
///
/// These are surfaced verbatim and never retried.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
    #[error("Token id {id} is outside the vocabulary of size {vocabulary_size}")]
    UnknownToken { id: TokenId, vocabulary_size: usize },
    #[error("Embedding row {id} has dimension {found}, expected {expected}")]
    RowDimension {
        id: TokenId,
        expected: usize,
        found: usize,
    },
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Read-only access to a model's input embedding table.
pub trait EmbeddingProvider: Send + Sync {
    fn vocabulary_size(&self) -> usize;

    fn dimension(&self) -> usize;

    fn embedding_of(&self, token_id: TokenId) -> Result<Vec<f32>, ProviderError>;
}

/// Text <-> token id conversion owned by the model.
pub trait TokenizerProvider: Send + Sync {
    /// Encode a batch, padded to the longest text of the batch.
    ///
    /// The returned mask marks content tokens; padding and special tokens are
    /// false.
    fn encode(&self, texts: &[String]) -> Result<EncodedBatch, ProviderError>;

    /// Decode one row, skipping non-content tokens.
    fn decode(&self, ids: &[TokenId]) -> Result<String, ProviderError>;
}
