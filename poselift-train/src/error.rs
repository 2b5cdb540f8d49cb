//! Error types for dataset construction and label coding.

use poselift_data::DataError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the sequence indexer, the dataset adapter and the codec.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Resource not found: {}", .0.display())]
    MissingResource(PathBuf),

    #[error("Shape mismatch in {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

impl TrainError {
    pub(crate) fn shape(what: &'static str, expected: &[usize], found: &[usize]) -> Self {
        TrainError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
