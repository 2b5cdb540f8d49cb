//! Error types for the command-line driver.

use poselift_train::TrainError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the driver.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Sample {id}: {source}")]
    Sample {
        id: usize,
        #[source]
        source: TrainError,
    },

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
