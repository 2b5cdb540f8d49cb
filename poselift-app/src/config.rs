//! Run configuration file.

use crate::errors::AppError;
use poselift_train::{DatasetConfig, PoseLiftingConfig};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Dataset and codec settings, as read from a JSON config file.
///
/// ```json
/// {
///   "dataset": {"ann_file": "annotation_body3d/h36m_train.json", "seq_len": 27},
///   "codec": {"num_keypoints": 17, "remove_root": true}
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub dataset: DatasetConfig,
    pub codec: PoseLiftingConfig,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::ConfigNotFound(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let config: RunConfig = serde_json::from_reader(reader)?;
        debug!("Loaded run config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
