//! Motion-capture sequence dataset

use crate::dataset::{DatasetConfig, KeypointSource, SequenceIndex, build_sequences};
use crate::error::TrainError;
use ndarray::{Array1, Array2, Array3, Axis};
use poselift_data::{
    AnnotationTable, CameraParam, CameraParamStore, load_annotations, load_factors,
    load_keypoint_2d_detections,
};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One training sample: the frames of a sequence and its supervision targets.
#[derive(Debug, Clone)]
pub struct MocapSample {
    /// Position of this sample in the dataset.
    pub id: usize,
    /// Frame indices into the annotation table.
    pub frame_ids: SequenceIndex,
    /// Image name of every frame.
    pub image_names: Vec<String>,
    /// 2D keypoints `[T, K, 2]`; empty with [`KeypointSource::Pipeline`].
    /// Projected from the 3D keypoints when the annotations carry no 2D
    /// ground truth and the camera has intrinsics.
    pub keypoints: Array3<f32>,
    /// 2D keypoint visibility `[T, K]`.
    pub keypoints_visible: Array2<f32>,
    /// 3D keypoints `[T, K, 3]`.
    pub keypoints_3d: Array3<f32>,
    /// 3D keypoint visibility `[T, K]`.
    pub keypoints_3d_visible: Array2<f32>,
    /// Positions within the sequence that are supervised.
    pub target_idx: Vec<usize>,
    /// 3D keypoints of the target frames `[targets, K, 3]`.
    pub lifting_target: Array3<f32>,
    /// Visibility of the target frames `[targets, K]`.
    pub lifting_target_visible: Array2<f32>,
    /// Per-frame projection factors `[T]`, when a factor file is configured.
    pub factor: Option<Array1<f32>>,
    /// Camera of the sequence, when a camera file is configured.
    pub camera_param: Option<CameraParam>,
}

/// Human3.6M-style dataset: frames grouped per video and cut into sequences.
///
/// All files are read in [`MocapDataset::new`]; afterwards the dataset is
/// read-only and can be shared between workers.
#[derive(Debug)]
pub struct MocapDataset {
    config: DatasetConfig,
    table: AnnotationTable,
    sequence_indices: Vec<SequenceIndex>,
    samples: Vec<MocapSample>,
    cameras: Option<CameraParamStore>,
}

impl MocapDataset {
    /// Load annotations and build every sample.
    ///
    /// `rng` drives subset selection when `subset_frac < 1`.
    #[tracing::instrument(skip_all, fields(ann_file = %config.ann_file.display()))]
    pub fn new<R: Rng>(config: DatasetConfig, rng: &mut R) -> Result<Self, TrainError> {
        config.sequence.validate()?;

        let ann_file = config.resolve(&config.ann_file);
        let det_file = match config.keypoint_2d_src {
            KeypointSource::Detection => {
                let path = config.keypoint_2d_det_file.as_ref().ok_or_else(|| {
                    TrainError::InvalidConfiguration(
                        "keypoint_2d_src is detection but keypoint_2d_det_file is not set"
                            .to_string(),
                    )
                })?;
                Some(config.resolve(path))
            }
            _ => None,
        };
        let factor_file = config.factor_file.as_deref().map(|p| config.resolve(p));
        let camera_file = config.camera_param_file.as_deref().map(|p| config.resolve(p));

        for path in std::iter::once(&ann_file)
            .chain(&det_file)
            .chain(&factor_file)
            .chain(&camera_file)
        {
            ensure_exists(path)?;
        }

        let table = load_annotations(&ann_file)?;
        let cameras = camera_file.map(CameraParamStore::load).transpose()?;
        let sequence_indices = build_sequences(table.image_names(), &config.sequence, rng)?;

        let detections = match &det_file {
            Some(path) => {
                let (keypoints, confidence) = load_keypoint_2d_detections(path)?;
                check_rows("keypoint detections", keypoints.len_of(Axis(0)), table.len())?;
                check_rows("keypoint detections", keypoints.len_of(Axis(1)), table.num_keypoints())?;
                Some((keypoints, confidence))
            }
            None => None,
        };
        let factors = match &factor_file {
            Some(path) => {
                let factors = load_factors(path)?;
                check_rows("factors", factors.len(), table.len())?;
                Some(factors)
            }
            None => None,
        };

        if config.keypoint_2d_src == KeypointSource::GroundTruth && !table.has_keypoints_2d() {
            if cameras.is_some() {
                info!("No 2D ground truth; projecting 3D keypoints with camera intrinsics");
            } else {
                warn!("No 2D ground truth and no camera file; 2D keypoints stay zero");
            }
        }

        let mut dataset = Self {
            config,
            table,
            sequence_indices,
            samples: Vec::new(),
            cameras,
        };
        dataset.samples = dataset
            .sequence_indices
            .iter()
            .enumerate()
            .map(|(id, frame_ids)| {
                dataset.build_sample(id, frame_ids, detections.as_ref(), factors.as_ref())
            })
            .collect::<Result<_, _>>()?;

        info!(
            "Dataset ready: {} frames, {} sequences, 2D keypoints from {}",
            dataset.table.len(),
            dataset.samples.len(),
            dataset.config.keypoint_2d_src
        );
        Ok(dataset)
    }

    fn build_sample(
        &self,
        id: usize,
        frame_ids: &SequenceIndex,
        detections: Option<&(Array3<f32>, Array2<f32>)>,
        factors: Option<&Array1<f32>>,
    ) -> Result<MocapSample, TrainError> {
        let k = self.table.num_keypoints();
        let keypoints_3d = self.table.keypoints_3d().select(Axis(0), frame_ids);
        let keypoints_3d_visible = self.table.keypoints_3d_visible().select(Axis(0), frame_ids);

        let target_idx = self.config.sequence.target_indices(frame_ids.len());
        let lifting_target = keypoints_3d.select(Axis(0), &target_idx);
        let lifting_target_visible = keypoints_3d_visible.select(Axis(0), &target_idx);

        let image_names: Vec<String> = frame_ids
            .iter()
            .map(|&i| self.table.image_names()[i].clone())
            .collect();

        let camera_param = match (&self.cameras, target_idx.first()) {
            (Some(cameras), Some(&t)) => Some(cameras.for_image(&image_names[t])?.clone()),
            _ => None,
        };

        let projected = match self.config.keypoint_2d_src {
            KeypointSource::GroundTruth if !self.table.has_keypoints_2d() => camera_param
                .as_ref()
                .and_then(|camera| camera.project_keypoints(keypoints_3d.view())),
            _ => None,
        };
        let (keypoints, keypoints_visible) = match (self.config.keypoint_2d_src, detections) {
            (KeypointSource::Detection, Some((keypoints, confidence))) => (
                keypoints.select(Axis(0), frame_ids),
                confidence.select(Axis(0), frame_ids),
            ),
            (KeypointSource::Pipeline, _) => (Array3::zeros((0, k, 2)), Array2::zeros((0, k))),
            _ => match projected {
                Some((pixels, valid)) => (pixels, valid * &keypoints_3d_visible),
                None => (
                    self.table.keypoints_2d().select(Axis(0), frame_ids),
                    self.table.keypoints_2d_visible().select(Axis(0), frame_ids),
                ),
            },
        };

        Ok(MocapSample {
            id,
            frame_ids: frame_ids.clone(),
            image_names,
            keypoints,
            keypoints_visible,
            keypoints_3d,
            keypoints_3d_visible,
            target_idx,
            lifting_target,
            lifting_target_visible,
            factor: factors.map(|f| f.select(Axis(0), frame_ids)),
            camera_param,
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// The loaded annotation table.
    pub fn table(&self) -> &AnnotationTable {
        &self.table
    }

    /// Cached sequence indices, in sample order.
    pub fn sequence_indices(&self) -> &[SequenceIndex] {
        &self.sequence_indices
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MocapSample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[MocapSample] {
        &self.samples
    }

    /// Camera parameters of the camera that recorded `image_name`.
    pub fn get_camera_param(&self, image_name: &str) -> Result<&CameraParam, TrainError> {
        let cameras = self.cameras.as_ref().ok_or_else(|| {
            TrainError::MissingResource(
                self.config
                    .camera_param_file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("<camera_param_file>")),
            )
        })?;
        Ok(cameras.for_image(image_name)?)
    }
}

fn ensure_exists(path: &Path) -> Result<(), TrainError> {
    if path.exists() {
        Ok(())
    } else {
        debug!("Missing dataset file: {}", path.display());
        Err(TrainError::MissingResource(path.to_path_buf()))
    }
}

fn check_rows(what: &'static str, found: usize, expected: usize) -> Result<(), TrainError> {
    if found == expected {
        Ok(())
    } else {
        Err(TrainError::shape(what, &[expected], &[found]))
    }
}
