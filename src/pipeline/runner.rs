use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, error, info, warn};

use crate::corpus::Corpus;
use crate::pipeline::config::{ConfigError, EpsilonLadder, PipelineConfig, ResumePolicy};
use crate::pipeline::context::SanitizerContext;
use crate::pipeline::error::{FailedStep, PipelineError, StepFailure};
use crate::pipeline::merge::{merge_slices, read_ids, read_slice};
use crate::pipeline::report::{EpsilonOutcome, EpsilonReport, RunReport};
use crate::pipeline::slice::{encode_corpus, encoding_fingerprint, sanitize_slice, EncodedSlice};
use crate::store::{
    Artifact, ArtifactKey, ArtifactStore, KeyPrefix, PersistenceError, Stage, StoreError,
};
use crate::types::{ContentDigest, Epsilon, TokenId};

const TARGET: &str = "dx_sanitizer::pipeline";

/// Drives sanitization of a whole corpus across the ε ladder.
///
/// Per ε, in ascending order: sanitize every slice (in parallel on the
/// worker pool), persist each as `(ids, ε, part)`, merge the parts once all
/// of them are written, persist `(ids, ε, full)`, delete the parts, then
/// decode and persist `(text, ε, full)`.
pub struct SlicedBatchPipeline<S> {
    config: PipelineConfig,
    ladder: EpsilonLadder,
    context: SanitizerContext,
    store: S,
    pool: ThreadPool,
}

impl<S: ArtifactStore> SlicedBatchPipeline<S> {
    /// Validate everything up front; nothing is read or written on error.
    pub fn new(
        config: PipelineConfig,
        context: SanitizerContext,
        store: S,
    ) -> Result<Self, ConfigError> {
        let ladder = config.validate()?;
        context.check(config.dimension)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("dx-slice-{i}"))
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;
        Ok(Self {
            config,
            ladder,
            context,
            store,
            pool,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ladder(&self) -> &EpsilonLadder {
        &self.ladder
    }

    pub fn context(&self) -> &SanitizerContext {
        &self.context
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run every ε of the ladder.
    ///
    /// The corpus is encoded and fingerprinted once per run. Under
    /// [`ResumePolicy::SkipCompleted`] a merged ε is kept only if it records
    /// the same fingerprint; otherwise it is computed again.
    ///
    /// The run ends with `Err` on failures shared by every ε: encoding the
    /// corpus, persisting the validity mask, and any provider error raised
    /// while processing an ε (`PipelineError::Aborted`). Other failures end
    /// only their ε and are reported.
    pub fn run(&self, corpus: &Corpus) -> Result<RunReport, PipelineError> {
        info!(
            target: TARGET,
            texts = corpus.len(),
            epsilons = self.ladder.len(),
            slice_width = self.config.slice_width,
            workers = self.config.workers,
            "run_started"
        );

        let slices = encode_corpus(&self.context, corpus, self.config.slice_width)?;
        let fingerprint = encoding_fingerprint(corpus, &slices);
        self.write_mask(&slices, &fingerprint)?;

        let mut reports = Vec::with_capacity(self.ladder.len());
        for &epsilon in self.ladder.as_slice() {
            let result = match self.reusable_merge(epsilon, &fingerprint) {
                Ok(Some(rows)) => self.resume_completed(epsilon, &rows),
                Ok(None) => self.run_epsilon(epsilon, &slices, &fingerprint, corpus.len()),
                Err(failure) => Err(failure),
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(failure) if failure.is_provider() => return Err(self.abort(failure)),
                Err(failure) => self.record_failure(failure),
            };
            reports.push(EpsilonReport { epsilon, outcome });
        }

        let report = RunReport {
            corpus_digest: corpus.digest().clone(),
            texts: corpus.len(),
            epsilons: reports,
        };
        info!(
            target: TARGET,
            success = report.is_success(),
            failed = report.failures().count(),
            "run_finished"
        );
        Ok(report)
    }

    fn run_epsilon(
        &self,
        epsilon: Epsilon,
        slices: &[EncodedSlice],
        fingerprint: &ContentDigest,
        rows: usize,
    ) -> Result<EpsilonOutcome, StepFailure> {
        let parts = slices.len() as u32;
        info!(target: TARGET, epsilon = epsilon.value(), parts, "epsilon_started");

        let reused: Vec<bool> = self.pool.install(|| {
            slices
                .par_iter()
                .map(|slice| self.sanitize_part(epsilon, slice))
                .collect::<Result<Vec<bool>, StepFailure>>()
        })?;
        let reused_parts = reused.iter().filter(|&&r| r).count() as u32;

        // every slice write has returned; safe to read them back
        let merged = merge_slices(&self.store, &self.config.retry, epsilon, parts, rows)
            .map_err(|e| StepFailure::new(epsilon, FailedStep::Merge, e))?;
        let merged_key = ArtifactKey::merged(Stage::Ids, epsilon);
        let merged_ids = Artifact::Ids {
            source: fingerprint.clone(),
            rows: merged.rows,
        };
        self.put(&merged_key, &merged_ids)
            .map_err(|e| StepFailure::new(epsilon, FailedStep::Merge, e))?;
        info!(target: TARGET, epsilon = epsilon.value(), parts, rows, "merge_verified");

        self.delete_all(&merged.part_keys)
            .map_err(|e| StepFailure::new(epsilon, FailedStep::Cleanup, e))?;

        if let Artifact::Ids { rows, .. } = &merged_ids {
            self.write_text(epsilon, rows)?;
        }

        info!(
            target: TARGET,
            epsilon = epsilon.value(),
            parts,
            reused_parts,
            "epsilon_completed"
        );
        Ok(EpsilonOutcome::Completed {
            parts,
            rows,
            reused_parts,
        })
    }

    /// Sanitize and persist one slice. Returns true when a matching artifact
    /// from an earlier run was kept instead.
    fn sanitize_part(&self, epsilon: Epsilon, slice: &EncodedSlice) -> Result<bool, StepFailure> {
        let part_index = slice.spec.part_index;
        let step = FailedStep::Slice { part_index };
        let key = ArtifactKey::slice(Stage::Ids, epsilon, part_index);

        let exists = self
            .config
            .retry
            .run(format!("contains {key}"), || self.store.contains(&key))
            .map_err(|e| StepFailure::new(epsilon, step, e))?;
        if exists {
            match read_slice(&self.store, &self.config.retry, &key) {
                Ok(existing) if slice.matches(&existing) => {
                    debug!(target: TARGET, epsilon = epsilon.value(), part_index, "slice_reused");
                    return Ok(true);
                }
                Ok(_) => warn!(
                    target: TARGET,
                    epsilon = epsilon.value(),
                    part_index,
                    "stale_slice_recomputed"
                ),
                Err(e) => warn!(
                    target: TARGET,
                    epsilon = epsilon.value(),
                    part_index,
                    error = %e,
                    "unreadable_slice_recomputed"
                ),
            }
        }

        let artifact = sanitize_slice(&self.context, slice, epsilon)
            .map_err(|e| StepFailure::new(epsilon, step, e))?;
        self.put(&key, &Artifact::Slice(artifact))
            .map_err(|e| StepFailure::new(epsilon, step, e))?;
        debug!(
            target: TARGET,
            epsilon = epsilon.value(),
            part_index,
            texts = slice.spec.len(),
            "slice_persisted"
        );
        Ok(false)
    }

    /// Merged rows of `epsilon` that this run may keep as they are: skipping
    /// is allowed and they were computed from `fingerprint`.
    fn reusable_merge(
        &self,
        epsilon: Epsilon,
        fingerprint: &ContentDigest,
    ) -> Result<Option<Vec<Vec<TokenId>>>, StepFailure> {
        if self.config.resume == ResumePolicy::Recompute {
            return Ok(None);
        }
        let resume_failure = |e: PersistenceError| StepFailure::new(epsilon, FailedStep::Resume, e);

        let key = ArtifactKey::merged(Stage::Ids, epsilon);
        let exists = self
            .config
            .retry
            .run(format!("contains {key}"), || self.store.contains(&key))
            .map_err(resume_failure)?;
        if !exists {
            return Ok(None);
        }

        let (source, rows) = read_ids(&self.store, &self.config.retry, &key).map_err(resume_failure)?;
        if source != *fingerprint {
            warn!(
                target: TARGET,
                epsilon = epsilon.value(),
                recorded = source.as_str(),
                current = fingerprint.as_str(),
                "stale_merge_recomputed"
            );
            return Ok(None);
        }
        Ok(Some(rows))
    }

    /// The merged ids are current: leave them alone, drop slices a crashed
    /// cleanup left behind and restore the text if it never got written.
    fn resume_completed(
        &self,
        epsilon: Epsilon,
        rows: &[Vec<TokenId>],
    ) -> Result<EpsilonOutcome, StepFailure> {
        let resume_failure = |e: PersistenceError| StepFailure::new(epsilon, FailedStep::Resume, e);

        let prefix = KeyPrefix::new(Stage::Ids, epsilon);
        let leftovers: Vec<ArtifactKey> = self
            .config
            .retry
            .run(format!("list {prefix}"), || self.store.list(&prefix))
            .map_err(resume_failure)?
            .into_iter()
            .filter(|key| key.part_index().is_some())
            .collect();
        if !leftovers.is_empty() {
            self.delete_all(&leftovers)
                .map_err(|e| StepFailure::new(epsilon, FailedStep::Cleanup, e))?;
        }

        let text_key = ArtifactKey::merged(Stage::Text, epsilon);
        let has_text = self
            .config
            .retry
            .run(format!("contains {text_key}"), || self.store.contains(&text_key))
            .map_err(resume_failure)?;
        if !has_text {
            self.write_text(epsilon, rows)?;
        }

        info!(
            target: TARGET,
            epsilon = epsilon.value(),
            text_regenerated = !has_text,
            "epsilon_skipped"
        );
        Ok(EpsilonOutcome::Skipped {
            text_regenerated: !has_text,
        })
    }

    fn write_text(&self, epsilon: Epsilon, rows: &[Vec<TokenId>]) -> Result<(), StepFailure> {
        let tokenizer = self.context.tokenizer();
        let texts = rows
            .iter()
            .map(|row| tokenizer.decode(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StepFailure::new(epsilon, FailedStep::Decode, e))?;
        let key = ArtifactKey::merged(Stage::Text, epsilon);
        self.put(&key, &Artifact::Texts { texts })
            .map_err(|e| StepFailure::new(epsilon, FailedStep::PersistText, e))
    }

    /// Persist the validity mask unless the stored one has the same
    /// fingerprint.
    fn write_mask(
        &self,
        slices: &[EncodedSlice],
        fingerprint: &ContentDigest,
    ) -> Result<(), PersistenceError> {
        let key = ArtifactKey::shared(Stage::Mask);
        let current = self.config.retry.run(format!("get {key}"), || {
            match self.store.get(&key) {
                Ok(Artifact::Mask { source, .. }) => Ok(source == *fingerprint),
                Ok(_) | Err(StoreError::NotFound(_)) | Err(StoreError::Corrupt { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        })?;
        if current {
            return Ok(());
        }
        let rows = slices.iter().flat_map(|s| s.batch.mask_rows()).collect();
        self.put(
            &key,
            &Artifact::Mask {
                source: fingerprint.clone(),
                rows,
            },
        )
    }

    fn put(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<(), PersistenceError> {
        self.config
            .retry
            .run(format!("put {key}"), || self.store.put(key, artifact))
    }

    fn delete_all(&self, keys: &[ArtifactKey]) -> Result<(), PersistenceError> {
        for key in keys {
            self.config
                .retry
                .run(format!("delete {key}"), || self.store.delete(key))?;
        }
        Ok(())
    }

    fn record_failure(&self, failure: StepFailure) -> EpsilonOutcome {
        error!(
            target: TARGET,
            epsilon = failure.epsilon.value(),
            step = %failure.step,
            error = %failure.source,
            "epsilon_failed"
        );
        EpsilonOutcome::Failed {
            step: failure.step,
            error: failure.source.to_string(),
        }
    }

    fn abort(&self, failure: StepFailure) -> PipelineError {
        error!(
            target: TARGET,
            epsilon = failure.epsilon.value(),
            step = %failure.step,
            error = %failure.source,
            "run_aborted"
        );
        PipelineError::Aborted(Box::new(failure))
    }
}
