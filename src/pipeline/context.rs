use std::sync::Arc;

use crate::mechanism::{GammaSphereNoise, NoiseSource};
use crate::pipeline::config::ConfigError;
use crate::vocabulary::{EmbeddingProvider, EmbeddingTable, ProviderError, TokenizerProvider};

/// Model state shared by every slice of a run: vocabulary, tokenizer and the
/// noise source.
///
/// Built once, explicitly, and never mutated. Cloning shares the collaborators.
#[derive(Clone)]
pub struct SanitizerContext {
    table: Arc<EmbeddingTable>,
    tokenizer: Arc<dyn TokenizerProvider>,
    noise: Arc<dyn NoiseSource>,
}

impl SanitizerContext {
    pub fn new(table: EmbeddingTable, tokenizer: Arc<dyn TokenizerProvider>) -> Self {
        Self {
            table: Arc::new(table),
            tokenizer,
            noise: Arc::new(GammaSphereNoise),
        }
    }

    /// Load the vocabulary from an embedding provider, once.
    pub fn from_providers(
        embeddings: &dyn EmbeddingProvider,
        tokenizer: Arc<dyn TokenizerProvider>,
    ) -> Result<Self, ProviderError> {
        Ok(Self::new(EmbeddingTable::load(embeddings)?, tokenizer))
    }

    /// Replace the noise source, e.g. with a deterministic one in tests.
    pub fn with_noise(mut self, noise: Arc<dyn NoiseSource>) -> Self {
        self.noise = noise;
        self
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    pub fn tokenizer(&self) -> &dyn TokenizerProvider {
        self.tokenizer.as_ref()
    }

    pub fn noise(&self) -> &dyn NoiseSource {
        self.noise.as_ref()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.table.vocabulary_size()
    }

    pub fn dimension(&self) -> usize {
        self.table.dimension()
    }

    /// The vocabulary must be usable and match the pinned dimension, if any.
    pub fn check(&self, expected_dimension: Option<usize>) -> Result<(), ConfigError> {
        if self.vocabulary_size() == 0 || self.dimension() == 0 {
            return Err(ConfigError::EmptyVocabulary);
        }
        match expected_dimension {
            Some(expected) if expected != self.dimension() => Err(ConfigError::DimensionMismatch {
                expected,
                found: self.dimension(),
            }),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for SanitizerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanitizerContext")
            .field("vocabulary_size", &self.vocabulary_size())
            .field("dimension", &self.dimension())
            .finish_non_exhaustive()
    }
}
