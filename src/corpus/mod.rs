pub mod corpus;

pub use corpus::{Corpus, CorpusError, SliceSpec};
