pub mod provider;
pub mod table;
pub mod tokenizer;

pub use provider::{EmbeddingProvider, ProviderError, TokenizerProvider};
pub use table::EmbeddingTable;
pub use tokenizer::WordTokenizer;
