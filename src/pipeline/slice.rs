use crate::corpus::{Corpus, SliceSpec};
use crate::mechanism::{perturb, NearestNeighborProjector};
use crate::pipeline::context::SanitizerContext;
use crate::pipeline::error::PipelineError;
use crate::store::SliceArtifact;
use crate::types::{ContentDigest, EncodedBatch, Epsilon};
use crate::vocabulary::ProviderError;

/// A slice after tokenization: ε-independent, shared read-only by every ε.
#[derive(Debug, Clone)]
pub struct EncodedSlice {
    pub spec: SliceSpec,
    pub batch: EncodedBatch,
    pub digest: ContentDigest,
}

impl EncodedSlice {
    /// Whether a stored slice artifact was computed from exactly this input.
    pub fn matches(&self, artifact: &SliceArtifact) -> bool {
        artifact.part_index == self.spec.part_index
            && artifact.first_row == self.spec.first_row()
            && artifact.ids.len() == self.spec.len()
            && artifact.input_digest == self.digest
    }
}

/// Tokenize the corpus slice by slice, each slice padded to its own longest
/// text.
pub fn encode_corpus(
    context: &SanitizerContext,
    corpus: &Corpus,
    slice_width: usize,
) -> Result<Vec<EncodedSlice>, ProviderError> {
    corpus
        .slices(slice_width)
        .into_iter()
        .map(|spec| {
            let batch = context.tokenizer().encode(corpus.slice_texts(&spec))?;
            if !batch.is_aligned() || batch.shape().texts != spec.len() {
                return Err(ProviderError::Encode(format!(
                    "slice {} encoded to ids {:?} and mask {:?} for {} texts",
                    spec.part_index,
                    batch.ids.dim(),
                    batch.mask.dim(),
                    spec.len(),
                )));
            }
            let digest = ContentDigest::from_encoded(batch.ids.view(), batch.mask.view());
            Ok(EncodedSlice { spec, batch, digest })
        })
        .collect()
}

/// Fingerprint of everything a merged artifact depends on besides noise:
/// the corpus texts, how they were sliced and what the tokenizer made of
/// each slice.
pub fn encoding_fingerprint(corpus: &Corpus, slices: &[EncodedSlice]) -> ContentDigest {
    let mut parts = Vec::with_capacity(1 + 2 * slices.len());
    parts.push(corpus.digest().as_str().to_string());
    for slice in slices {
        parts.push(format!("{}+{}", slice.spec.first_row(), slice.spec.len()));
        parts.push(slice.digest.as_str().to_string());
    }
    ContentDigest::from_texts(&parts)
}

/// Sanitize one slice at one ε: embed, sample, perturb, project.
///
/// All tensors are local to this call and freed on return, so peak memory is
/// bounded by the slice width.
pub fn sanitize_slice(
    context: &SanitizerContext,
    slice: &EncodedSlice,
    epsilon: Epsilon,
) -> Result<SliceArtifact, PipelineError> {
    let embeddings = context.table().embed(slice.batch.ids.view())?;
    let noise = context
        .noise()
        .sample(slice.batch.shape(), context.dimension(), epsilon)?;
    let perturbed = perturb(embeddings.view(), noise.view(), slice.batch.mask.view())?;
    drop(noise);
    drop(embeddings);

    let ids = NearestNeighborProjector::new(context.table()).project(perturbed.view())?;

    Ok(SliceArtifact {
        part_index: slice.spec.part_index,
        first_row: slice.spec.first_row(),
        input_digest: slice.digest.clone(),
        ids: ids.outer_iter().map(|row| row.to_vec()).collect(),
    })
}
