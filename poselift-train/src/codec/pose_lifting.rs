//! Monocular pose-lifting label codec
//!
//! Encodes 2D keypoints and 3D lifting targets into training labels and
//! decodes model outputs back into 3D coordinates.

use crate::codec::ScoreStrategy;
use crate::error::TrainError;
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut3, Axis, s};
use poselift_data::CameraParam;
use serde::Deserialize;
use tracing::debug;

/// Options of [`PoseLiftingCodec`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoseLiftingConfig {
    /// Number of joints per pose.
    pub num_keypoints: usize,
    /// Index of the root (pelvis) joint.
    pub root_index: usize,
    /// Make 3D targets root-relative. When off, 2D keypoints are normalized
    /// by the frame size instead.
    pub zero_center: bool,
    /// Drop the root joint from 3D labels. Only applies with `zero_center`.
    pub remove_root: bool,
    /// Keep the root index and the pre-removal label when the root is dropped.
    pub save_index: bool,
    /// Append 2D visibility as a third keypoint channel.
    pub concat_vis: bool,
    /// Per-joint 2D mean, flattened `[K * 2]`.
    pub keypoints_mean: Option<Vec<f32>>,
    /// Per-joint 2D standard deviation, flattened `[K * 2]`.
    pub keypoints_std: Option<Vec<f32>>,
    /// Per-joint 3D label mean, flattened `[K' * 3]`.
    pub target_mean: Option<Vec<f32>>,
    /// Per-joint 3D label standard deviation, flattened `[K' * 3]`.
    pub target_std: Option<Vec<f32>>,
}

impl Default for PoseLiftingConfig {
    fn default() -> Self {
        Self {
            num_keypoints: 17,
            root_index: 0,
            zero_center: true,
            remove_root: false,
            save_index: false,
            concat_vis: false,
            keypoints_mean: None,
            keypoints_std: None,
            target_mean: None,
            target_std: None,
        }
    }
}

impl PoseLiftingConfig {
    fn removes_root(&self) -> bool {
        self.zero_center && self.remove_root
    }

    /// Joints in the 3D label.
    pub fn label_keypoints(&self) -> usize {
        self.num_keypoints - usize::from(self.removes_root())
    }
}

/// Labels produced by [`PoseLiftingCodec::encode`].
#[derive(Debug, Clone)]
pub struct EncodedLabel {
    /// 2D input labels `[N, K, 2]`, or `[N, K, 3]` with visibility appended.
    pub keypoint_labels: Array3<f32>,
    /// 2D visibility `[N, K]`.
    pub keypoint_labels_visible: Array2<f32>,
    /// 3D targets `[M, K', 3]`, root-relative with `zero_center`.
    pub lifting_target_label: Array3<f32>,
    /// Per-joint supervision weights `[M, K']`.
    pub lifting_target_weights: Array2<f32>,
    /// Per-joint weights for root trajectory supervision `[M, K]`.
    pub trajectory_weights: Array2<f32>,
    /// 3D target visibility `[M, K']`.
    pub lifting_target_visible: Array2<f32>,
    /// Absolute root position `[M, 3]`, set with `zero_center`.
    pub target_root: Option<Array2<f32>>,
    /// Whether the root joint was dropped from the 3D label.
    pub target_root_removed: bool,
    /// Index the root has to be reinserted at, set with `save_index`.
    pub target_root_index: Option<usize>,
    /// Root-relative label before the root was dropped, set with `save_index`.
    pub pre_removal_label: Option<Array3<f32>>,
}

/// Per-joint normalization statistics `[K, C]`.
#[derive(Debug, Clone)]
struct Standardizer {
    mean: Array2<f32>,
    std: Array2<f32>,
}

impl Standardizer {
    fn new(
        name: &str,
        mean: &Option<Vec<f32>>,
        std: &Option<Vec<f32>>,
        joints: usize,
        dims: usize,
    ) -> Result<Option<Self>, TrainError> {
        let (mean, std) = match (mean, std) {
            (None, None) => return Ok(None),
            (Some(mean), Some(std)) => (mean, std),
            _ => {
                return Err(TrainError::InvalidConfiguration(format!(
                    "{name}_mean and {name}_std must be given together"
                )));
            }
        };
        let expected = joints * dims;
        if mean.len() != expected || std.len() != expected {
            return Err(TrainError::InvalidConfiguration(format!(
                "{name}_mean/{name}_std need {expected} values ({joints} joints x {dims}), got {}/{}",
                mean.len(),
                std.len()
            )));
        }
        if std.iter().any(|&v| v == 0.0 || !v.is_finite()) {
            return Err(TrainError::InvalidConfiguration(format!(
                "{name}_std must be finite and non-zero"
            )));
        }
        let to_array = |values: &Vec<f32>| {
            Array2::from_shape_fn((joints, dims), |(j, c)| values[j * dims + c])
        };
        Ok(Some(Self {
            mean: to_array(mean),
            std: to_array(std),
        }))
    }

    fn check(&self, what: &'static str, data: &ArrayViewMut3<f32>) -> Result<(), TrainError> {
        let (_, k, c) = data.dim();
        if (k, c) != self.mean.dim() {
            let (jk, jc) = self.mean.dim();
            return Err(TrainError::shape(what, &[jk, jc], &[k, c]));
        }
        Ok(())
    }

    fn normalize(&self, what: &'static str, mut data: ArrayViewMut3<f32>) -> Result<(), TrainError> {
        self.check(what, &data)?;
        for mut frame in data.outer_iter_mut() {
            frame -= &self.mean;
            frame /= &self.std;
        }
        Ok(())
    }

    fn denormalize(&self, what: &'static str, mut data: ArrayViewMut3<f32>) -> Result<(), TrainError> {
        self.check(what, &data)?;
        for mut frame in data.outer_iter_mut() {
            frame *= &self.std;
            frame += &self.mean;
        }
        Ok(())
    }
}

/// Converts between raw keypoints and pose-lifting training labels.
///
/// The codec holds no per-sample state; `encode` and `decode` allocate fresh
/// outputs and can be called from several workers at once.
#[derive(Debug, Clone)]
pub struct PoseLiftingCodec {
    config: PoseLiftingConfig,
    keypoints_norm: Option<Standardizer>,
    target_norm: Option<Standardizer>,
    score_strategy: ScoreStrategy,
}

impl PoseLiftingCodec {
    /// Create a codec, validating the configuration.
    pub fn new(config: PoseLiftingConfig) -> Result<Self, TrainError> {
        if config.num_keypoints == 0 {
            return Err(TrainError::InvalidConfiguration(
                "num_keypoints must be at least 1".to_string(),
            ));
        }
        if config.root_index >= config.num_keypoints {
            return Err(TrainError::InvalidConfiguration(format!(
                "root_index {} out of range for {} keypoints",
                config.root_index, config.num_keypoints
            )));
        }

        let keypoints_norm = Standardizer::new(
            "keypoints",
            &config.keypoints_mean,
            &config.keypoints_std,
            config.num_keypoints,
            2,
        )?;
        let target_norm = Standardizer::new(
            "target",
            &config.target_mean,
            &config.target_std,
            config.label_keypoints(),
            3,
        )?;

        Ok(Self {
            config,
            keypoints_norm,
            target_norm,
            score_strategy: ScoreStrategy::default(),
        })
    }

    /// Use a different confidence score for decoded joints.
    pub fn with_score_strategy(mut self, strategy: ScoreStrategy) -> Self {
        self.score_strategy = strategy;
        self
    }

    pub fn config(&self) -> &PoseLiftingConfig {
        &self.config
    }

    /// Encode one sample.
    ///
    /// * `keypoints`: 2D keypoints `[N, K, C]`, only the first two channels are used.
    /// * `keypoints_visible`: `[N, K]`, all visible when `None`.
    /// * `lifting_target`: 3D targets `[M, K, 3]` with `M == N` or `M == 1`.
    /// * `lifting_target_visible`: `[M, K]`.
    /// * `camera`: required when `zero_center` is off.
    pub fn encode(
        &self,
        keypoints: ArrayView3<f32>,
        keypoints_visible: Option<ArrayView2<f32>>,
        lifting_target: ArrayView3<f32>,
        lifting_target_visible: Option<ArrayView2<f32>>,
        camera: Option<&CameraParam>,
    ) -> Result<EncodedLabel, TrainError> {
        let num_keypoints = self.config.num_keypoints;
        let (n, k, c) = keypoints.dim();
        if k != num_keypoints || c < 2 {
            return Err(TrainError::shape("keypoints", &[n, num_keypoints, 2], &[n, k, c]));
        }
        let keypoints_visible = match keypoints_visible {
            Some(vis) if vis.dim() != (n, k) => {
                return Err(TrainError::shape("keypoints_visible", &[n, k], vis.shape()));
            }
            Some(vis) => vis.to_owned(),
            None => Array2::ones((n, k)),
        };

        let (m, kt, ct) = lifting_target.dim();
        if kt != num_keypoints || ct != 3 || (m != n && m != 1) {
            return Err(TrainError::shape("lifting_target", &[n, num_keypoints, 3], &[m, kt, ct]));
        }

        let (mut lifting_target_visible, mut lifting_target_weights, trajectory_weights) =
            match lifting_target_visible {
                Some(vis) if vis.dim() != (m, k) => {
                    return Err(TrainError::shape("lifting_target_visible", &[m, k], vis.shape()));
                }
                Some(vis) => {
                    let weights = vis.mapv(|v| if v > 0.5 { 1.0 } else { 0.0 });
                    (vis.to_owned(), weights.clone(), weights)
                }
                None => {
                    let trajectory = lifting_target.map_axis(Axis(2), |p| inverse_depth(p[2]));
                    (Array2::ones((m, k)), Array2::ones((m, k)), trajectory)
                }
            };

        let mut lifting_target_label = lifting_target.to_owned();
        let mut target_root = None;
        let mut target_root_removed = false;
        let mut target_root_index = None;
        let mut pre_removal_label = None;

        if self.config.zero_center {
            let root_index = self.config.root_index;
            let root = lifting_target.index_axis(Axis(1), root_index).to_owned();
            for (mut frame, root) in lifting_target_label.outer_iter_mut().zip(root.outer_iter()) {
                for mut joint in frame.outer_iter_mut() {
                    joint -= &root;
                }
            }
            target_root = Some(root);

            if self.config.remove_root {
                let keep: Vec<usize> = (0..k).filter(|&j| j != root_index).collect();
                let removed = lifting_target_label.select(Axis(1), &keep);
                lifting_target_visible = lifting_target_visible.select(Axis(1), &keep);
                lifting_target_weights = lifting_target_weights.select(Axis(1), &keep);
                target_root_removed = true;

                if self.config.save_index {
                    target_root_index = Some(root_index);
                    pre_removal_label = Some(lifting_target_label);
                }
                lifting_target_label = removed;
            }
        }

        let mut keypoint_labels = keypoints.slice(s![.., .., ..2]).to_owned();
        if !self.config.zero_center {
            let camera = camera.ok_or(TrainError::MissingParameter(
                "camera_param with w and h is required when zero_center is off",
            ))?;
            normalize_screen(&mut keypoint_labels, camera)?;
        }

        if let Some(norm) = &self.keypoints_norm {
            norm.normalize("keypoint_labels", keypoint_labels.view_mut())?;
        }
        if let Some(norm) = &self.target_norm {
            norm.normalize("lifting_target_label", lifting_target_label.view_mut())?;
        }

        if self.config.concat_vis {
            keypoint_labels = Array3::from_shape_fn((n, k, 3), |(i, j, ch)| {
                if ch < 2 {
                    keypoint_labels[[i, j, ch]]
                } else {
                    keypoints_visible[[i, j]]
                }
            });
        }

        debug!(
            "Encoded {} frames: keypoint labels {:?}, lifting target label {:?}",
            n,
            keypoint_labels.dim(),
            lifting_target_label.dim()
        );

        Ok(EncodedLabel {
            keypoint_labels,
            keypoint_labels_visible: keypoints_visible,
            lifting_target_label,
            lifting_target_weights,
            trajectory_weights,
            lifting_target_visible,
            target_root,
            target_root_removed,
            target_root_index,
            pre_removal_label,
        })
    }

    /// Decode model output `[N, K', C]` into coordinates and per-joint scores.
    ///
    /// * `target_root`: `[N, 3]` or `[1, 3]`, undoes zero-centering and
    ///   reinserts a removed root joint. Labels are only root-relative with
    ///   `zero_center`, so the root is not added otherwise.
    /// * `w`, `h`: per-frame image size `[N]`. When given, `encoded` holds 2D
    ///   keypoint labels: their standardization and screen normalization are
    ///   undone on the first two channels. Otherwise `encoded` holds 3D labels
    ///   and the target standardization is undone.
    pub fn decode(
        &self,
        encoded: ArrayView3<f32>,
        target_root: Option<ArrayView2<f32>>,
        w: Option<ArrayView1<f32>>,
        h: Option<ArrayView1<f32>>,
    ) -> Result<(Array3<f32>, Array2<f32>), TrainError> {
        let (n, k, c) = encoded.dim();
        let target_root = target_root.filter(|root| !root.is_empty());
        let image_size = match (w.filter(|w| !w.is_empty()), h.filter(|h| !h.is_empty())) {
            (Some(w), Some(h)) => Some((w, h)),
            (None, None) => None,
            _ => return Err(TrainError::MissingParameter("w and h must be given together")),
        };
        if !self.config.zero_center && target_root.is_none() && image_size.is_none() {
            return Err(TrainError::MissingParameter(
                "w and h are required to denormalize when zero_center is off",
            ));
        }

        let mut keypoints = encoded.to_owned();
        if let (Some(norm), None) = (&self.target_norm, image_size) {
            norm.denormalize("encoded", keypoints.view_mut())?;
        }

        if let Some(root) = target_root.filter(|_| self.config.zero_center) {
            let (rn, rc) = root.dim();
            if rc != 3 || (rn != n && rn != 1) {
                return Err(TrainError::shape("target_root", &[n, 3], &[rn, rc]));
            }
            if c < 3 {
                return Err(TrainError::shape("encoded", &[n, k, 3], &[n, k, c]));
            }
            let root_row = |i: usize| if rn == 1 { 0 } else { i };

            for (i, mut frame) in keypoints.outer_iter_mut().enumerate() {
                let frame_root = root.row(root_row(i));
                for mut joint in frame.outer_iter_mut() {
                    let mut xyz = joint.slice_mut(s![..3]);
                    xyz += &frame_root;
                }
            }

            if self.config.removes_root() {
                let root_index = self.config.root_index.min(k);
                keypoints = Array3::from_shape_fn((n, k + 1, c), |(i, j, ch)| {
                    if j == root_index {
                        if ch < 3 { root[[root_row(i), ch]] } else { 0.0 }
                    } else {
                        keypoints[[i, if j < root_index { j } else { j - 1 }, ch]]
                    }
                });
            }
        }

        if let Some((w, h)) = image_size {
            if w.len() != n || h.len() != n {
                return Err(TrainError::shape("w/h", &[n], &[w.len(), h.len()]));
            }
            if c < 2 {
                return Err(TrainError::shape("encoded", &[n, k, 2], &[n, k, c]));
            }
            if let Some(norm) = &self.keypoints_norm {
                norm.denormalize("encoded", keypoints.slice_mut(s![.., .., ..2]))?;
            }
            for (i, mut frame) in keypoints.outer_iter_mut().enumerate() {
                let half_w = w[i] / 2.0;
                let aspect = h[i] / w[i];
                frame.column_mut(0).mapv_inplace(|x| (x + 1.0) * half_w);
                frame.column_mut(1).mapv_inplace(|y| (y + aspect) * half_w);
            }
        }

        let scores = self.score_strategy.scores(&keypoints);
        Ok((keypoints, scores))
    }
}

/// Map pixel coordinates to `[-1, 1]` along x, keeping the aspect ratio on y.
fn normalize_screen(keypoints: &mut Array3<f32>, camera: &CameraParam) -> Result<(), TrainError> {
    if !(camera.w > 0.0 && camera.h > 0.0) {
        return Err(TrainError::MissingParameter(
            "camera_param w and h must be positive",
        ));
    }
    let center = [0.5 * camera.w, 0.5 * camera.h];
    let scale = 0.5 * camera.w;
    for mut frame in keypoints.outer_iter_mut() {
        for mut joint in frame.outer_iter_mut() {
            joint[0] = (joint[0] - center[0]) / scale;
            joint[1] = (joint[1] - center[1]) / scale;
        }
    }
    Ok(())
}

fn inverse_depth(z: f32) -> f32 {
    let z = z.abs();
    if z > f32::EPSILON && z.is_finite() { 1.0 / z } else { 0.0 }
}
