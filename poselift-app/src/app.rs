//! Driver state and main run loop with builder pattern.

use crate::config::RunConfig;
use crate::errors::AppError;
use ndarray::{Array1, Array3, s};
use poselift_train::{MocapDataset, MocapSample, PoseLiftingCodec};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// Summary of one pass over a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Annotated frames in the dataset.
    pub frames: usize,
    /// Sequences (samples) built from those frames.
    pub sequences: usize,
    /// Largest absolute coordinate error after encode then decode.
    pub max_round_trip_error: f32,
}

/// Builder for configuring and running the driver.
pub struct AppBuilder {
    config: RunConfig,
    seed: u64,
    logging: LoggingConfig,
}

impl AppBuilder {
    /// Create a new AppBuilder with default settings.
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            seed: 0,
            logging: LoggingConfig::default(),
        }
    }

    /// Set dataset and codec settings.
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the seed used for subset selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Configure logging.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Run the driver.
    pub fn run(self) -> Result<Report, AppError> {
        self.init_logging();

        info!(
            "poselift {} (seed {})",
            env!("CARGO_PKG_VERSION"),
            self.seed
        );

        let codec = PoseLiftingCodec::new(self.config.codec)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let dataset = MocapDataset::new(self.config.dataset, &mut rng)?;

        let report = evaluate(&dataset, &codec)?;
        info!(
            "{} frames, {} sequences, max round-trip error {:.6}",
            report.frames, report.sequences, report.max_round_trip_error
        );
        Ok(report)
    }

    fn init_logging(&self) {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level));
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false));

        #[cfg(feature = "tracy")]
        if self.logging.enable_tracy {
            subscriber.with(tracing_tracy::TracyLayer::default()).init();
            return;
        }

        subscriber.init();
        #[cfg(not(feature = "tracy"))]
        if self.logging.enable_tracy {
            warn!("Tracy requested but poselift was built without the `tracy` feature");
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode every sample, decode the labels back and measure the error.
pub fn evaluate(dataset: &MocapDataset, codec: &PoseLiftingCodec) -> Result<Report, AppError> {
    let mut max_error = 0.0f32;
    for sample in dataset.samples() {
        let error = round_trip_error(sample, codec).map_err(|source| AppError::Sample {
            id: sample.id,
            source,
        })?;
        debug!("Sample {}: round-trip error {:.6}", sample.id, error);
        max_error = max_error.max(error);
    }

    if dataset.is_empty() {
        warn!("Dataset produced no sequences; check seq_len against video lengths");
    }

    Ok(Report {
        frames: dataset.table().len(),
        sequences: dataset.len(),
        max_round_trip_error: max_error,
    })
}

fn round_trip_error(
    sample: &MocapSample,
    codec: &PoseLiftingCodec,
) -> Result<f32, poselift_train::TrainError> {
    let encoded = codec.encode(
        sample.keypoints.view(),
        Some(sample.keypoints_visible.view()),
        sample.lifting_target.view(),
        Some(sample.lifting_target_visible.view()),
        sample.camera_param.as_ref(),
    )?;

    let (decoded, expected): (Array3<f32>, Array3<f32>) = match &encoded.target_root {
        Some(root) => {
            let (decoded, _) = codec.decode(
                encoded.lifting_target_label.view(),
                Some(root.view()),
                None,
                None,
            )?;
            (decoded, sample.lifting_target.clone())
        }
        None => {
            let frames = encoded.keypoint_labels.dim().0;
            let (w, h) = sample
                .camera_param
                .as_ref()
                .map(|camera| (camera.w, camera.h))
                .unwrap_or_default();
            let w = Array1::from_elem(frames, w);
            let h = Array1::from_elem(frames, h);
            let (decoded, _) = codec.decode(
                encoded.keypoint_labels.view(),
                None,
                Some(w.view()),
                Some(h.view()),
            )?;
            (
                decoded.slice(s![.., .., ..2]).to_owned(),
                sample.keypoints.clone(),
            )
        }
    };

    Ok(decoded
        .iter()
        .zip(expected.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poselift_train::{DatasetConfig, PoseLiftingConfig, SequenceConfig};
    use std::path::{Path, PathBuf};

    fn write_dataset(dir: &Path) -> (PathBuf, PathBuf) {
        let mut names = Vec::new();
        let mut s = Vec::new();
        let mut part = Vec::new();
        for f in 0..8 {
            names.push(format!("S1_Greeting.54138969_{:06}.jpg", f + 1));
            s.push(
                (0..4)
                    .map(|j| [0.1 * j as f32, 0.2 * f as f32, 4.0 + 0.1 * j as f32, 1.0])
                    .collect::<Vec<_>>(),
            );
            part.push(
                (0..4)
                    .map(|j| [400.0 + 10.0 * j as f32, 300.0 + f as f32, 1.0])
                    .collect::<Vec<_>>(),
            );
        }
        let ann = dir.join("ann.json");
        std::fs::write(
            &ann,
            serde_json::json!({ "imgname": names, "S": s, "part": part }).to_string(),
        )
        .unwrap();

        let cameras = dir.join("cameras.json");
        std::fs::write(
            &cameras,
            r#"[{"subject": "S1", "camera": "54138969", "w": 1000, "h": 1002}]"#,
        )
        .unwrap();
        (ann, cameras)
    }

    fn dataset(dir: &Path, sequence: SequenceConfig) -> MocapDataset {
        let (ann_file, camera_file) = write_dataset(dir);
        let config = DatasetConfig {
            ann_file,
            camera_param_file: Some(camera_file),
            sequence,
            ..Default::default()
        };
        MocapDataset::new(config, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn test_evaluate_zero_centered() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(
            dir.path(),
            SequenceConfig {
                seq_len: 3,
                ..Default::default()
            },
        );
        for remove_root in [false, true] {
            let codec = PoseLiftingCodec::new(PoseLiftingConfig {
                num_keypoints: 4,
                remove_root,
                ..Default::default()
            })
            .unwrap();
            let report = evaluate(&dataset, &codec).unwrap();
            assert_eq!(report.frames, 8);
            assert_eq!(report.sequences, 6);
            assert!(report.max_round_trip_error < 1e-5);
        }
    }

    #[test]
    fn test_evaluate_screen_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(
            dir.path(),
            SequenceConfig {
                seq_len: 5,
                pad_video_seq: true,
                causal: false,
                ..Default::default()
            },
        );
        let codec = PoseLiftingCodec::new(PoseLiftingConfig {
            num_keypoints: 4,
            zero_center: false,
            concat_vis: true,
            ..Default::default()
        })
        .unwrap();
        let report = evaluate(&dataset, &codec).unwrap();
        assert_eq!(report.sequences, 8);
        assert!(report.max_round_trip_error < 1e-2);
    }

    #[test]
    fn test_evaluate_reports_sample_errors() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path(), SequenceConfig::default());
        // Annotations have 4 joints
        let codec = PoseLiftingCodec::new(PoseLiftingConfig::default()).unwrap();
        assert!(matches!(
            evaluate(&dataset, &codec),
            Err(AppError::Sample { id: 0, .. })
        ));
    }
}
