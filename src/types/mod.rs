pub mod batch;
pub mod identifiers;

pub use batch::{BatchShape, EncodedBatch};
pub use identifiers::{ContentDigest, Epsilon, InvalidEpsilon, TokenId};
