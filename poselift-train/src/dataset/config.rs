//! Dataset configuration

use crate::dataset::SequenceConfig;
use crate::error::TrainError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where the 2D keypoints of each sample come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeypointSource {
    /// Ground-truth 2D keypoints from the annotation file.
    #[default]
    GroundTruth,
    /// A precomputed detection file `[N, K, 3]`.
    Detection,
    /// Left empty; produced later by the consuming pipeline.
    Pipeline,
}

impl FromStr for KeypointSource {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(KeypointSource::GroundTruth),
            "detection" => Ok(KeypointSource::Detection),
            "pipeline" => Ok(KeypointSource::Pipeline),
            other => Err(TrainError::InvalidConfiguration(format!(
                "unsupported keypoint_2d_src \"{other}\", expected one of gt, detection, pipeline"
            ))),
        }
    }
}

impl fmt::Display for KeypointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeypointSource::GroundTruth => write!(f, "gt"),
            KeypointSource::Detection => write!(f, "detection"),
            KeypointSource::Pipeline => write!(f, "pipeline"),
        }
    }
}

impl<'de> Deserialize<'de> for KeypointSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Configuration of a mocap sequence dataset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Annotation file (JSON).
    pub ann_file: PathBuf,
    /// Directory that relative file paths are resolved against.
    pub data_root: Option<PathBuf>,
    /// Windowing of videos into sequences.
    #[serde(flatten)]
    pub sequence: SequenceConfig,
    /// Source of 2D keypoints.
    pub keypoint_2d_src: KeypointSource,
    /// 2D detection file (`.npy`), used with [`KeypointSource::Detection`].
    pub keypoint_2d_det_file: Option<PathBuf>,
    /// Per-frame projection factors (`.npy`).
    pub factor_file: Option<PathBuf>,
    /// Camera parameters (JSON).
    pub camera_param_file: Option<PathBuf>,
}

impl DatasetConfig {
    /// Resolve a configured path against `data_root` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.data_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_source_parse() {
        assert_eq!("gt".parse::<KeypointSource>().unwrap(), KeypointSource::GroundTruth);
        assert_eq!("detection".parse::<KeypointSource>().unwrap(), KeypointSource::Detection);
        assert_eq!("pipeline".parse::<KeypointSource>().unwrap(), KeypointSource::Pipeline);
        assert!(matches!(
            "openpose".parse::<KeypointSource>(),
            Err(TrainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_keypoint_source_display_round_trip() {
        for source in [
            KeypointSource::GroundTruth,
            KeypointSource::Detection,
            KeypointSource::Pipeline,
        ] {
            assert_eq!(source.to_string().parse::<KeypointSource>().unwrap(), source);
        }
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config: DatasetConfig = serde_json::from_str(
            r#"{"ann_file": "h36m_train.json", "seq_len": 27, "causal": false}"#,
        )
        .unwrap();
        assert_eq!(config.ann_file, PathBuf::from("h36m_train.json"));
        assert_eq!(config.sequence.seq_len, 27);
        assert_eq!(config.sequence.seq_step, 1);
        assert!(!config.sequence.causal);
        assert_eq!(config.keypoint_2d_src, KeypointSource::GroundTruth);
    }

    #[test]
    fn test_config_rejects_unknown_source() {
        let result: Result<DatasetConfig, _> =
            serde_json::from_str(r#"{"keypoint_2d_src": "openpose"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let config = DatasetConfig {
            data_root: Some(PathBuf::from("/data/h36m")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve(Path::new("annotation/train.json")),
            PathBuf::from("/data/h36m/annotation/train.json")
        );
        assert_eq!(
            config.resolve(Path::new("/abs/det.npy")),
            PathBuf::from("/abs/det.npy")
        );
    }
}
