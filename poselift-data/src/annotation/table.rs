//! Columnar annotation table

use crate::error::DataError;
use ndarray::{Array2, Array3};

/// Parallel per-frame annotation arrays, loaded once and read-only afterwards.
///
/// Row `i` of every column describes the frame named `image_names[i]`.
#[derive(Debug, Clone)]
pub struct AnnotationTable {
    image_names: Vec<String>,
    keypoints_3d: Array3<f32>,
    keypoints_3d_visible: Array2<f32>,
    keypoints_2d: Array3<f32>,
    keypoints_2d_visible: Array2<f32>,
    has_keypoints_2d: bool,
}

impl AnnotationTable {
    /// Build a table, checking that every column has one row per image and
    /// the same number of joints.
    ///
    /// `keypoints_2d` holds ground-truth 2D keypoints `[N, K, 2]` and their
    /// visibility `[N, K]`. Without them the 2D columns are zero.
    pub fn new(
        image_names: Vec<String>,
        keypoints_3d: Array3<f32>,
        keypoints_3d_visible: Array2<f32>,
        keypoints_2d: Option<(Array3<f32>, Array2<f32>)>,
    ) -> Result<Self, DataError> {
        let n = image_names.len();
        let k = keypoints_3d.dim().1;

        if keypoints_3d.dim() != (n, k, 3) {
            return Err(DataError::shape("keypoints_3d", &[n, k, 3], keypoints_3d.shape()));
        }
        if keypoints_3d_visible.dim() != (n, k) {
            return Err(DataError::shape(
                "keypoints_3d_visible",
                &[n, k],
                keypoints_3d_visible.shape(),
            ));
        }

        let has_keypoints_2d = keypoints_2d.is_some();
        let (keypoints_2d, keypoints_2d_visible) =
            keypoints_2d.unwrap_or_else(|| (Array3::zeros((n, k, 2)), Array2::zeros((n, k))));
        if keypoints_2d.dim() != (n, k, 2) {
            return Err(DataError::shape("keypoints_2d", &[n, k, 2], keypoints_2d.shape()));
        }
        if keypoints_2d_visible.dim() != (n, k) {
            return Err(DataError::shape(
                "keypoints_2d_visible",
                &[n, k],
                keypoints_2d_visible.shape(),
            ));
        }

        Ok(Self {
            image_names,
            keypoints_3d,
            keypoints_3d_visible,
            keypoints_2d,
            keypoints_2d_visible,
            has_keypoints_2d,
        })
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.image_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_names.is_empty()
    }

    /// Number of joints per frame.
    pub fn num_keypoints(&self) -> usize {
        self.keypoints_3d.dim().1
    }

    pub fn image_names(&self) -> &[String] {
        &self.image_names
    }

    /// 3D keypoints `[N, K, 3]`, in camera space.
    pub fn keypoints_3d(&self) -> &Array3<f32> {
        &self.keypoints_3d
    }

    /// 3D keypoint visibility `[N, K]`.
    pub fn keypoints_3d_visible(&self) -> &Array2<f32> {
        &self.keypoints_3d_visible
    }

    /// Ground-truth 2D keypoints `[N, K, 2]`.
    pub fn keypoints_2d(&self) -> &Array3<f32> {
        &self.keypoints_2d
    }

    /// Ground-truth 2D keypoint visibility `[N, K]`.
    pub fn keypoints_2d_visible(&self) -> &Array2<f32> {
        &self.keypoints_2d_visible
    }

    /// Whether the annotation file carried 2D ground truth.
    pub fn has_keypoints_2d(&self) -> bool {
        self.has_keypoints_2d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S1_Walk.1_{:06}.jpg", i + 1)).collect()
    }

    #[test]
    fn test_table_with_2d() {
        let mut keypoints_2d = Array3::zeros((2, 17, 2));
        keypoints_2d[[1, 4, 0]] = 320.0;
        let table = AnnotationTable::new(
            names(2),
            Array3::ones((2, 17, 3)),
            Array2::ones((2, 17)),
            Some((keypoints_2d, Array2::ones((2, 17)))),
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.num_keypoints(), 17);
        assert!(table.has_keypoints_2d());
        assert_eq!(table.keypoints_2d()[[1, 4, 0]], 320.0);
    }

    #[test]
    fn test_table_without_2d() {
        let table =
            AnnotationTable::new(names(3), Array3::ones((3, 5, 3)), Array2::ones((3, 5)), None)
                .unwrap();
        assert!(!table.has_keypoints_2d());
        assert_eq!(table.keypoints_2d().dim(), (3, 5, 2));
        assert!(table.keypoints_2d_visible().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_column_length_mismatch() {
        let result = AnnotationTable::new(
            names(1),
            Array3::zeros((2, 17, 3)),
            Array2::zeros((2, 17)),
            None,
        );
        assert!(matches!(result, Err(DataError::ShapeMismatch { what: "keypoints_3d", .. })));

        let result = AnnotationTable::new(
            names(2),
            Array3::zeros((2, 17, 3)),
            Array2::zeros((2, 17)),
            Some((Array3::zeros((2, 16, 2)), Array2::zeros((2, 17)))),
        );
        assert!(matches!(result, Err(DataError::ShapeMismatch { what: "keypoints_2d", .. })));
    }

    #[test]
    fn test_empty_table() {
        let table =
            AnnotationTable::new(Vec::new(), Array3::zeros((0, 0, 3)), Array2::zeros((0, 0)), None)
                .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.num_keypoints(), 0);
    }
}
