//! Poselift driver
//!
//! Indexes a mocap annotation file into training sequences and checks that
//! the pose-lifting codec reproduces every sample after an encode/decode pass.

mod app;
mod config;
mod errors;

use app::{AppBuilder, LoggingConfig};
use clap::Parser;
use config::RunConfig;
use errors::AppError;
use std::path::PathBuf;

/// Poselift - 3D pose-lifting dataset indexing
#[derive(Parser, Debug)]
#[command(name = "poselift")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON run config with `dataset` and `codec` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Annotation file (JSON)
    #[arg(short, long)]
    ann_file: Option<PathBuf>,

    /// Directory that relative file paths are resolved against
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Camera parameter file (JSON)
    #[arg(long)]
    camera_param_file: Option<PathBuf>,

    /// Frames per sequence
    #[arg(long)]
    seq_len: Option<usize>,

    /// Interval between sampled frames
    #[arg(long)]
    seq_step: Option<usize>,

    /// Merge this many consecutive frames into one multi-target sequence
    #[arg(long)]
    multiple_target: Option<usize>,

    /// Pad videos so that every frame is a target
    #[arg(long)]
    pad_video_seq: bool,

    /// Target the middle frame instead of the last one
    #[arg(long)]
    non_causal: bool,

    /// Fraction of sequences to keep
    #[arg(long)]
    subset_frac: Option<f64>,

    /// Source of 2D keypoints (gt, detection, pipeline)
    #[arg(long)]
    keypoint_2d_src: Option<String>,

    /// 2D detection file (.npy)
    #[arg(long)]
    det_file: Option<PathBuf>,

    /// Per-frame factor file (.npy)
    #[arg(long)]
    factor_file: Option<PathBuf>,

    /// Number of joints per pose
    #[arg(long)]
    num_keypoints: Option<usize>,

    /// Drop the root joint from 3D labels
    #[arg(long)]
    remove_root: bool,

    /// Normalize 2D keypoints by image size instead of zero-centering 3D targets
    #[arg(long)]
    screen_normalize: bool,

    /// Seed for subset selection
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Send spans to Tracy (needs the `tracy` feature)
    #[arg(long)]
    tracy: bool,
}

impl Args {
    fn into_run_config(self) -> Result<RunConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };

        let dataset = &mut config.dataset;
        if let Some(path) = self.ann_file {
            dataset.ann_file = path;
        }
        if self.data_root.is_some() {
            dataset.data_root = self.data_root;
        }
        if self.camera_param_file.is_some() {
            dataset.camera_param_file = self.camera_param_file;
        }
        if self.det_file.is_some() {
            dataset.keypoint_2d_det_file = self.det_file;
        }
        if self.factor_file.is_some() {
            dataset.factor_file = self.factor_file;
        }
        if let Some(src) = self.keypoint_2d_src {
            dataset.keypoint_2d_src = src.parse()?;
        }

        let sequence = &mut dataset.sequence;
        if let Some(seq_len) = self.seq_len {
            sequence.seq_len = seq_len;
        }
        if let Some(seq_step) = self.seq_step {
            sequence.seq_step = seq_step;
        }
        if let Some(multiple_target) = self.multiple_target {
            sequence.multiple_target = multiple_target;
        }
        if let Some(subset_frac) = self.subset_frac {
            sequence.subset_frac = subset_frac;
        }
        sequence.pad_video_seq |= self.pad_video_seq;
        if self.non_causal {
            sequence.causal = false;
        }

        let codec = &mut config.codec;
        if let Some(num_keypoints) = self.num_keypoints {
            codec.num_keypoints = num_keypoints;
        }
        codec.remove_root |= self.remove_root;
        if self.screen_normalize {
            codec.zero_center = false;
        }

        Ok(config)
    }
}

fn main() {
    let args = Args::parse();
    let logging = LoggingConfig {
        level: args.log_level.clone(),
        enable_tracy: args.tracy,
    };
    let seed = args.seed;

    let result = args.into_run_config().and_then(|config| {
        AppBuilder::new()
            .with_config(config)
            .with_seed(seed)
            .with_logging(logging)
            .run()
    });

    if let Err(e) = result {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poselift_train::KeypointSource;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "poselift",
            "--ann-file",
            "train.json",
            "--seq-len",
            "27",
            "--non-causal",
            "--pad-video-seq",
            "--keypoint-2d-src",
            "detection",
            "--det-file",
            "det.npy",
            "--remove-root",
        ]);
        let config = args.into_run_config().unwrap();
        assert_eq!(config.dataset.ann_file, PathBuf::from("train.json"));
        assert_eq!(config.dataset.sequence.seq_len, 27);
        assert!(!config.dataset.sequence.causal);
        assert!(config.dataset.sequence.pad_video_seq);
        assert_eq!(config.dataset.keypoint_2d_src, KeypointSource::Detection);
        assert_eq!(config.dataset.keypoint_2d_det_file, Some(PathBuf::from("det.npy")));
        assert!(config.codec.remove_root);
        assert!(config.codec.zero_center);
    }

    #[test]
    fn test_cli_rejects_unknown_keypoint_source() {
        let args = Args::parse_from(["poselift", "--keypoint-2d-src", "openpose"]);
        assert!(matches!(args.into_run_config(), Err(AppError::Train(_))));
    }

    #[test]
    fn test_cli_missing_config_file() {
        let args = Args::parse_from(["poselift", "--config", "/nonexistent/run.json"]);
        assert!(matches!(
            args.into_run_config(),
            Err(AppError::ConfigNotFound(_))
        ));
    }
}
