use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MechanismError {
    #[error("Shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Invalid noise distribution: {0}")]
    InvalidDistribution(String),
    #[error("Vocabulary is empty")]
    EmptyVocabulary,
}

pub(crate) fn check_shape(
    what: &'static str,
    expected: &[usize],
    found: &[usize],
) -> Result<(), MechanismError> {
    if expected == found {
        Ok(())
    } else {
        Err(MechanismError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        })
    }
}
