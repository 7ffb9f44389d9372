use std::fs;
use std::sync::Arc;
use std::time::Duration;

use dx_sanitizer::pipeline::{
    ConfigError, EpsilonLadder, PipelineConfig, ResumePolicy, SanitizerContext,
    SlicedBatchPipeline,
};
use dx_sanitizer::store::{ArtifactStore, MemoryArtifactStore, RetryPolicy};
use dx_sanitizer::types::Epsilon;
use dx_sanitizer::vocabulary::{EmbeddingTable, WordTokenizer};
use ndarray::Array2;
use tempfile::tempdir;

fn context() -> SanitizerContext {
    let table = EmbeddingTable::from_rows(vec![vec![0.0, 1.0, 2.0]; 4]).unwrap();
    SanitizerContext::new(table, Arc::new(WordTokenizer::new(["yes", "no"])))
}

#[test]
fn v0_ladder_is_one_then_steps_of_five() {
    let config = PipelineConfig::v0();
    let ladder = config.validate().unwrap();

    let values: Vec<f64> = ladder.as_slice().iter().map(|e| e.value()).collect();
    let mut expected = vec![1.0];
    expected.extend((1..=20).map(|k| 5.0 * k as f64));
    assert_eq!(values, expected);
    assert_eq!(ladder.len(), 21);
    assert_eq!(config.slice_width, 1000);
    assert_eq!(config.resume, ResumePolicy::SkipCompleted);
}

#[test]
fn ladder_is_sorted_ascending() {
    let ladder = EpsilonLadder::new(&[50.0, 1.0, 0.5]).unwrap();
    let values: Vec<f64> = ladder.as_slice().iter().map(|e| e.value()).collect();
    assert_eq!(values, vec![0.5, 1.0, 50.0]);
}

#[test]
fn ladder_rejects_bad_values() {
    assert!(matches!(EpsilonLadder::new(&[]), Err(ConfigError::EmptyLadder)));
    assert!(matches!(
        EpsilonLadder::new(&[1.0, 0.0]),
        Err(ConfigError::InvalidEpsilon(_))
    ));
    assert!(matches!(
        EpsilonLadder::new(&[-3.0]),
        Err(ConfigError::InvalidEpsilon(_))
    ));
    assert!(matches!(
        EpsilonLadder::new(&[f64::NAN]),
        Err(ConfigError::InvalidEpsilon(_))
    ));
    assert!(matches!(
        EpsilonLadder::new(&[f64::INFINITY]),
        Err(ConfigError::InvalidEpsilon(_))
    ));
    match EpsilonLadder::new(&[5.0, 1.0, 5.0]) {
        Err(ConfigError::DuplicateEpsilon(e)) => assert_eq!(e, Epsilon::new(5.0).unwrap()),
        other => panic!("expected duplicate, got {other:?}"),
    }
}

#[test]
fn zero_sized_settings_are_rejected() {
    let mut config = PipelineConfig::v0();
    config.slice_width = 0;
    assert!(matches!(config.validate(), Err(ConfigError::ZeroSliceWidth)));

    let mut config = PipelineConfig::v0();
    config.workers = 0;
    assert!(matches!(config.validate(), Err(ConfigError::ZeroWorkers)));

    let mut config = PipelineConfig::v0();
    config.retry = RetryPolicy::new(0, Duration::from_millis(10));
    assert!(matches!(config.validate(), Err(ConfigError::ZeroRetryLimit)));
}

#[test]
fn config_loads_from_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    fs::write(
        &path,
        r#"{
            "epsilons": [10.0, 1.0],
            "slice_width": 64,
            "workers": 4,
            "retry": { "limit": 5, "base_delay_ms": 20 },
            "resume": "recompute",
            "dimension": 3
        }"#,
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(&path).unwrap();
    assert_eq!(config.slice_width, 64);
    assert_eq!(config.workers, 4);
    assert_eq!(config.retry, RetryPolicy::new(5, Duration::from_millis(20)));
    assert_eq!(config.resume, ResumePolicy::Recompute);
    assert_eq!(config.dimension, Some(3));
    assert_eq!(config.validate().unwrap().len(), 2);
}

#[test]
fn config_json_survives_a_write_and_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("v0.json");
    fs::write(&path, serde_json::to_vec_pretty(&PipelineConfig::v0()).unwrap()).unwrap();

    assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), PipelineConfig::v0());
}

#[test]
fn missing_or_malformed_config_file_is_reported() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        PipelineConfig::from_json_file(&dir.path().join("absent.json")),
        Err(ConfigError::Io(_))
    ));

    let path = dir.path().join("bad.json");
    fs::write(&path, "{ \"epsilons\": \"many\" }").unwrap();
    assert!(matches!(
        PipelineConfig::from_json_file(&path),
        Err(ConfigError::Serialization(_))
    ));
}

#[test]
fn pinned_dimension_must_match_the_vocabulary() {
    let mut config = PipelineConfig::v0();
    config.dimension = Some(768);

    match SlicedBatchPipeline::new(config, context(), MemoryArtifactStore::new()) {
        Err(ConfigError::DimensionMismatch { expected, found }) => {
            assert_eq!((expected, found), (768, 3));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("pipeline accepted a mismatched dimension"),
    }
}

#[test]
fn empty_vocabulary_is_rejected() {
    let empty = SanitizerContext::new(
        EmbeddingTable::new(Array2::zeros((0, 3))),
        Arc::new(WordTokenizer::new(Vec::<String>::new())),
    );
    assert!(matches!(
        empty.check(None),
        Err(ConfigError::EmptyVocabulary)
    ));
}

#[test]
fn rejected_pipeline_writes_nothing() {
    let store = Arc::new(MemoryArtifactStore::new());
    let mut config = PipelineConfig::v0();
    config.epsilons.push(1.0);

    assert!(SlicedBatchPipeline::new(config, context(), Arc::clone(&store)).is_err());
    assert!(store.is_empty());
}
