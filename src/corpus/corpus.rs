use std::fs;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::identifiers::ContentDigest;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corpus file is not a JSON array of strings: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Text {index} is not valid UTF-8")]
    InvalidUtf8 {
        index: usize,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// The ordered set of texts to sanitize. Row `i` of every artifact belongs
/// to text `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    texts: Vec<String>,
    digest: ContentDigest,
}

impl Corpus {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts: Vec<String> = texts.into_iter().map(Into::into).collect();
        let digest = ContentDigest::from_texts(&texts);
        Corpus { texts, digest }
    }

    /// Ingest raw bytes. Every text must be valid UTF-8; nothing is normalized.
    pub fn ingest(raw: Vec<Vec<u8>>) -> Result<Self, CorpusError> {
        let texts = raw
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| {
                String::from_utf8(bytes).map_err(|source| CorpusError::InvalidUtf8 { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Corpus::from_texts(texts))
    }

    /// Load a corpus stored as a JSON array of strings.
    pub fn load_json(path: &Path) -> Result<Self, CorpusError> {
        let f = fs::File::open(path)?;
        let texts: Vec<String> = serde_json::from_reader(std::io::BufReader::new(f))?;
        Ok(Corpus::from_texts(texts))
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Partition into ordered, contiguous slices of at most `width` texts.
    ///
    /// `width` must be non-zero; the pipeline config rejects zero before
    /// this is reached.
    pub fn slices(&self, width: usize) -> Vec<SliceSpec> {
        debug_assert!(width > 0, "slice width must be positive");
        let width = width.max(1);
        (0..self.texts.len())
            .step_by(width)
            .enumerate()
            .map(|(part, start)| SliceSpec {
                part_index: part as u32,
                rows: start..(start + width).min(self.texts.len()),
            })
            .collect()
    }

    pub fn slice_texts(&self, spec: &SliceSpec) -> &[String] {
        &self.texts[spec.rows.clone()]
    }
}

/// One bounded unit of work: texts `rows` of the corpus, persisted as part
/// `part_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceSpec {
    pub part_index: u32,
    pub rows: Range<usize>,
}

impl SliceSpec {
    pub fn first_row(&self) -> usize {
        self.rows.start
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
