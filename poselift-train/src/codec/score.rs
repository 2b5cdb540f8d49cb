//! Per-joint confidence scores for decoded poses

use ndarray::{Array2, Array3, Axis};

/// How decoded joints are scored when the model predicts no uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreStrategy {
    /// The same score for every joint.
    Constant(f32),
    /// 1 for joints whose coordinates are all finite, 0 otherwise.
    Finite,
}

impl Default for ScoreStrategy {
    fn default() -> Self {
        ScoreStrategy::Constant(1.0)
    }
}

impl ScoreStrategy {
    /// Score every joint of `keypoints` `[N, K, C]`, returning `[N, K]`.
    pub fn scores(&self, keypoints: &Array3<f32>) -> Array2<f32> {
        let (n, k, _) = keypoints.dim();
        match *self {
            ScoreStrategy::Constant(score) => Array2::from_elem((n, k), score),
            ScoreStrategy::Finite => keypoints.map_axis(Axis(2), |joint| {
                if joint.iter().all(|v| v.is_finite()) { 1.0 } else { 0.0 }
            }),
        }
    }
}
