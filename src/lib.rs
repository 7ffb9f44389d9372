//! Metric differential-privacy (dχ-privacy) text sanitization.
//!
//! `dx-sanitizer` perturbs the token embeddings of a document with noise
//! calibrated by a privacy parameter ε, then projects every perturbed vector
//! back onto its nearest vocabulary embedding. The result is a sanitized
//! token sequence any downstream model can consume.
//!
//! The [`pipeline::SlicedBatchPipeline`] applies this to a whole corpus for
//! a ladder of ε values, in bounded slices, with every intermediate
//! persisted through an [`store::ArtifactStore`] so that runs can resume.
//! Model loading and tokenization stay outside, behind the traits in
//! [`vocabulary`].

pub mod corpus;
pub mod mechanism;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod vocabulary;
