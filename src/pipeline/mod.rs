pub mod config;
pub mod context;
pub mod error;
pub mod merge;
pub mod report;
pub mod runner;
pub mod slice;

pub use config::{ConfigError, EpsilonLadder, PipelineConfig, ResumePolicy};
pub use context::SanitizerContext;
pub use error::{FailedStep, PipelineError, StepFailure};
pub use merge::{merge_slices, verified_part_keys, IncompleteMergeError, MergedSlices};
pub use report::{EpsilonOutcome, EpsilonReport, RunReport};
pub use runner::SlicedBatchPipeline;
pub use slice::{encode_corpus, encoding_fingerprint, sanitize_slice, EncodedSlice};
