//! Error types for annotation and camera loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or querying pose annotations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Resource not found: {}", .0.display())]
    MissingResource(PathBuf),

    #[error("Image name does not follow `{{subject}}_{{action}}.{{camera}}_{{frame}}`: {0}")]
    InvalidImageName(String),

    #[error("No camera parameters for subject {subject}, camera {camera}")]
    UnknownCamera { subject: String, camera: String },

    #[error("Shape mismatch in {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NPY error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),
}

impl DataError {
    pub(crate) fn shape(what: &'static str, expected: &[usize], found: &[usize]) -> Self {
        DataError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
