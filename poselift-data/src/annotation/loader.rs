//! Annotation, detection and factor file loading

use crate::annotation::AnnotationTable;
use crate::error::DataError;
use ndarray::{Array1, Array2, Array3, s};
use ndarray_npy::read_npy;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

// Annotation file structure
#[derive(Deserialize, Debug)]
struct AnnotationFile {
    imgname: Vec<String>,
    /// 3D keypoints with visibility: `[N][K][x, y, z, vis]`
    #[serde(rename = "S")]
    keypoints_3d: Vec<Vec<[f32; 4]>>,
    /// 2D keypoints with visibility: `[N][K][x, y, vis]`
    #[serde(default)]
    part: Option<Vec<Vec<[f32; 3]>>>,
}

fn ensure_exists(path: &Path) -> Result<(), DataError> {
    if path.exists() {
        Ok(())
    } else {
        Err(DataError::MissingResource(path.to_path_buf()))
    }
}

/// Load the annotation table from a JSON file.
///
/// When the file carries no 2D ground truth (`part`), 2D keypoints are zero
/// with zero visibility and [`AnnotationTable::has_keypoints_2d`] is false.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_annotations(path: impl AsRef<Path>) -> Result<AnnotationTable, DataError> {
    let path = path.as_ref();
    ensure_exists(path)?;
    debug!("Loading annotations from: {}", path.display());

    let reader = BufReader::new(File::open(path)?);
    let file: AnnotationFile = serde_json::from_reader(reader)?;

    let n = file.imgname.len();
    let k = file.keypoints_3d.first().map_or(0, Vec::len);

    if file.keypoints_3d.len() != n {
        return Err(DataError::shape("S", &[n, k, 4], &[file.keypoints_3d.len(), k, 4]));
    }

    let mut keypoints_3d = Array3::zeros((n, k, 3));
    let mut keypoints_3d_visible = Array2::zeros((n, k));
    for (i, frame) in file.keypoints_3d.iter().enumerate() {
        if frame.len() != k {
            return Err(DataError::shape("S", &[k], &[frame.len()]));
        }
        for (j, [x, y, z, vis]) in frame.iter().copied().enumerate() {
            keypoints_3d[[i, j, 0]] = x;
            keypoints_3d[[i, j, 1]] = y;
            keypoints_3d[[i, j, 2]] = z;
            keypoints_3d_visible[[i, j]] = vis;
        }
    }

    let keypoints_2d = match &file.part {
        Some(part) => {
            if part.len() != n {
                return Err(DataError::shape("part", &[n, k, 3], &[part.len(), k, 3]));
            }
            let mut keypoints_2d = Array3::zeros((n, k, 2));
            let mut keypoints_2d_visible = Array2::zeros((n, k));
            for (i, frame) in part.iter().enumerate() {
                if frame.len() != k {
                    return Err(DataError::shape("part", &[k], &[frame.len()]));
                }
                for (j, [x, y, vis]) in frame.iter().copied().enumerate() {
                    keypoints_2d[[i, j, 0]] = x;
                    keypoints_2d[[i, j, 1]] = y;
                    keypoints_2d_visible[[i, j]] = vis;
                }
            }
            Some((keypoints_2d, keypoints_2d_visible))
        }
        None => {
            warn!("Annotation file has no 2D keypoints");
            None
        }
    };

    info!("Annotations loaded: {} frames, {} keypoints", n, k);

    AnnotationTable::new(
        file.imgname,
        keypoints_3d,
        keypoints_3d_visible,
        keypoints_2d,
    )
}

/// Load 2D keypoint detections `[N, K, 3]` (x, y, confidence) from a `.npy`
/// file and split them into coordinates and confidences.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_keypoint_2d_detections(
    path: impl AsRef<Path>,
) -> Result<(Array3<f32>, Array2<f32>), DataError> {
    let path = path.as_ref();
    ensure_exists(path)?;

    let detections: Array3<f32> = read_npy(path)?;
    let (n, k, c) = detections.dim();
    if c != 3 {
        return Err(DataError::shape("keypoint detections", &[n, k, 3], &[n, k, c]));
    }

    let keypoints = detections.slice(s![.., .., ..2]).to_owned();
    let confidence = detections.slice(s![.., .., 2]).to_owned();
    debug!("Loaded {} detected frames with {} keypoints", n, k);
    Ok((keypoints, confidence))
}

/// Load per-frame projection factors `[N]` from a `.npy` file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_factors(path: impl AsRef<Path>) -> Result<Array1<f32>, DataError> {
    let path = path.as_ref();
    ensure_exists(path)?;

    let factors: Array1<f32> = read_npy(path)?;
    debug!("Loaded {} projection factors", factors.len());
    Ok(factors)
}
