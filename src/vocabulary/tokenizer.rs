use std::collections::HashMap;

use ndarray::Array2;

use crate::types::{EncodedBatch, TokenId};
use crate::vocabulary::provider::{ProviderError, TokenizerProvider};

/// v0: whitespace word tokenizer over a fixed word list.
///
/// Id 0 is padding, id 1 is the unknown word, listed words follow from id 2.
/// Both reserved ids are special: padding is masked out of noise, and
/// neither is emitted on decode.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    words: Vec<String>,
    index: HashMap<String, TokenId>,
}

impl WordTokenizer {
    pub const PAD_ID: TokenId = 0;
    pub const UNKNOWN_ID: TokenId = 1;
    const RESERVED: usize = 2;

    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Vec::new();
        let mut index = HashMap::new();
        for word in words {
            let word = word.into();
            if index.contains_key(&word) {
                continue;
            }
            index.insert(word.clone(), (list.len() + Self::RESERVED) as TokenId);
            list.push(word);
        }
        Self { words: list, index }
    }

    /// Number of ids this tokenizer can emit, reserved ids included.
    pub fn vocabulary_size(&self) -> usize {
        self.words.len() + Self::RESERVED
    }

    pub fn id_of(&self, word: &str) -> TokenId {
        self.index.get(word).copied().unwrap_or(Self::UNKNOWN_ID)
    }

    fn is_special(id: TokenId) -> bool {
        (id as usize) < Self::RESERVED
    }
}

impl TokenizerProvider for WordTokenizer {
    fn encode(&self, texts: &[String]) -> Result<EncodedBatch, ProviderError> {
        let rows: Vec<Vec<TokenId>> = texts
            .iter()
            .map(|text| text.split_whitespace().map(|w| self.id_of(w)).collect())
            .collect();
        let positions = rows.iter().map(Vec::len).max().unwrap_or(0);

        let mut ids = Array2::from_elem((rows.len(), positions), Self::PAD_ID);
        let mut mask = Array2::from_elem((rows.len(), positions), false);
        for (n, row) in rows.iter().enumerate() {
            for (l, &id) in row.iter().enumerate() {
                ids[[n, l]] = id;
                mask[[n, l]] = true;
            }
        }
        Ok(EncodedBatch { ids, mask })
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String, ProviderError> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if Self::is_special(id) {
                continue;
            }
            let word = self
                .words
                .get(id as usize - Self::RESERVED)
                .ok_or_else(|| ProviderError::Decode(format!("unknown token id {id}")))?;
            out.push(word.as_str());
        }
        Ok(out.join(" "))
    }
}
