//! Camera parameters keyed by (subject, camera).

use crate::error::DataError;
use crate::types::VideoKey;
use glam::{Mat3, Vec2, Vec3};
use ndarray::{Array2, Array3, ArrayView3};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Intrinsic and extrinsic parameters of one camera.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraParam {
    /// Frame width in pixels.
    pub w: f32,
    /// Frame height in pixels.
    pub h: f32,
    /// Focal length (fx, fy).
    #[serde(default)]
    pub f: Option<Vec2>,
    /// Principal point (cx, cy).
    #[serde(default)]
    pub c: Option<Vec2>,
    /// World-to-camera rotation, row-major.
    #[serde(default, rename = "R", deserialize_with = "de_row_major")]
    pub rotation: Option<Mat3>,
    /// World-to-camera translation.
    #[serde(default, rename = "T")]
    pub translation: Option<Vec3>,
}

fn de_row_major<'de, D>(deserializer: D) -> Result<Option<Mat3>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let rows: Option<[[f32; 3]; 3]> = Option::deserialize(deserializer)?;
    Ok(rows.map(|r| Mat3::from_cols_array_2d(&r).transpose()))
}

impl CameraParam {
    /// Parameters with only a frame size.
    pub fn with_size(w: f32, h: f32) -> Self {
        Self {
            w,
            h,
            f: None,
            c: None,
            rotation: None,
            translation: None,
        }
    }

    /// Project a camera-space point to pixel coordinates.
    ///
    /// Returns `None` when intrinsics are missing or the point lies on the
    /// camera plane.
    pub fn project(&self, point: Vec3) -> Option<Vec2> {
        let (f, c) = (self.f?, self.c?);
        if point.z.abs() <= f32::EPSILON {
            return None;
        }
        Some(Vec2::new(point.x, point.y) / point.z * f + c)
    }

    /// Project camera-space keypoints `[N, K, 3]` to pixels `[N, K, 2]`.
    ///
    /// Also returns `[N, K]` with 1 where a joint could be projected and 0
    /// where it lies on the camera plane. `None` without intrinsics.
    pub fn project_keypoints(&self, keypoints: ArrayView3<f32>) -> Option<(Array3<f32>, Array2<f32>)> {
        if self.f.is_none() || self.c.is_none() {
            return None;
        }
        let (n, k, _) = keypoints.dim();
        let mut pixels = Array3::zeros((n, k, 2));
        let mut projected = Array2::zeros((n, k));
        for i in 0..n {
            for j in 0..k {
                let point =
                    Vec3::new(keypoints[[i, j, 0]], keypoints[[i, j, 1]], keypoints[[i, j, 2]]);
                if let Some(uv) = self.project(point) {
                    pixels[[i, j, 0]] = uv.x;
                    pixels[[i, j, 1]] = uv.y;
                    projected[[i, j]] = 1.0;
                }
            }
        }
        Some((pixels, projected))
    }
}

#[derive(Deserialize)]
struct CameraEntry {
    subject: String,
    camera: String,
    #[serde(flatten)]
    param: CameraParam,
}

/// Read-only table of camera parameters, loaded once.
#[derive(Debug, Clone, Default)]
pub struct CameraParamStore {
    params: HashMap<(String, String), CameraParam>,
}

impl CameraParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON list of `{subject, camera, w, h, f?, c?, R?, T?}` entries.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::MissingResource(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let entries: Vec<CameraEntry> = serde_json::from_reader(reader)?;

        let mut store = Self::new();
        for entry in entries {
            store.insert(entry.subject, entry.camera, entry.param);
        }
        info!("Loaded {} camera parameter sets", store.len());
        Ok(store)
    }

    /// Add or replace the parameters of one camera.
    pub fn insert(
        &mut self,
        subject: impl Into<String>,
        camera: impl Into<String>,
        param: CameraParam,
    ) {
        let key = (subject.into(), camera.into());
        debug!("Camera {}/{}: {}x{}", key.0, key.1, param.w, param.h);
        self.params.insert(key, param);
    }

    /// Look up parameters for a (subject, camera) pair.
    pub fn get(&self, subject: &str, camera: &str) -> Result<&CameraParam, DataError> {
        self.params
            .get(&(subject.to_string(), camera.to_string()))
            .ok_or_else(|| DataError::UnknownCamera {
                subject: subject.to_string(),
                camera: camera.to_string(),
            })
    }

    /// Look up parameters for the camera that recorded a video.
    pub fn for_video(&self, key: &VideoKey) -> Result<&CameraParam, DataError> {
        let (subject, camera) = key.camera_key();
        self.get(subject, camera)
    }

    /// Look up parameters for the camera that recorded an image.
    pub fn for_image(&self, image_name: &str) -> Result<&CameraParam, DataError> {
        self.for_video(&VideoKey::parse(image_name)?)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CAMERAS_JSON: &str = r#"[
        {"subject": "S1", "camera": "54138969", "w": 1000, "h": 1002,
         "f": [1145.0, 1143.8], "c": [512.5, 515.5],
         "R": [[1, 0, 0], [0, 0, -1], [0, 1, 0]], "T": [0.0, 0.0, 5.0]},
        {"subject": "S1", "camera": "55011271", "w": 1000, "h": 1000}
    ]"#;

    fn write_cameras() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CAMERAS_JSON.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_lookup() {
        let file = write_cameras();
        let store = CameraParamStore::load(file.path()).unwrap();
        assert_eq!(store.len(), 2);

        let param = store
            .for_image("S1/S1_Directions_1.54138969/S1_Directions_1.54138969_000001.jpg")
            .unwrap();
        assert_eq!(param.w, 1000.0);
        assert_eq!(param.h, 1002.0);
        assert_eq!(param.c, Some(Vec2::new(512.5, 515.5)));

        let bare = store.get("S1", "55011271").unwrap();
        assert!(bare.f.is_none());
        assert!(bare.rotation.is_none());
    }

    #[test]
    fn test_rotation_is_row_major() {
        let file = write_cameras();
        let store = CameraParamStore::load(file.path()).unwrap();
        let param = store.get("S1", "54138969").unwrap();

        let rotation = param.rotation.unwrap();
        assert_eq!(rotation.row(1), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(rotation * Vec3::Z, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(param.translation, Some(Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn test_unknown_camera() {
        let store = CameraParamStore::new();
        assert!(matches!(
            store.get("S9", "1"),
            Err(DataError::UnknownCamera { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = CameraParamStore::load("/nonexistent/cameras.json");
        assert!(matches!(result, Err(DataError::MissingResource(_))));
    }

    #[test]
    fn test_project_center_point() {
        let mut param = CameraParam::with_size(1000.0, 1000.0);
        assert!(param.project(Vec3::Z).is_none());

        param.f = Some(Vec2::splat(1000.0));
        param.c = Some(Vec2::splat(500.0));
        let uv = param.project(Vec3::new(0.0, 0.0, 4.0)).unwrap();
        assert_eq!(uv, Vec2::splat(500.0));

        let uv = param.project(Vec3::new(1.0, -1.0, 2.0)).unwrap();
        assert_eq!(uv, Vec2::new(1000.0, 0.0));
        assert!(param.project(Vec3::new(1.0, 1.0, 0.0)).is_none());
    }

    #[test]
    fn test_project_keypoints() {
        let mut param = CameraParam::with_size(1000.0, 1000.0);
        let mut keypoints = Array3::<f32>::zeros((2, 2, 3));
        keypoints[[0, 0, 2]] = 4.0;
        keypoints[[0, 1, 0]] = 1.0;
        keypoints[[0, 1, 1]] = -1.0;
        keypoints[[0, 1, 2]] = 2.0;
        keypoints[[1, 0, 2]] = 2.0;
        assert!(param.project_keypoints(keypoints.view()).is_none());

        param.f = Some(Vec2::splat(1000.0));
        param.c = Some(Vec2::splat(500.0));
        let (pixels, projected) = param.project_keypoints(keypoints.view()).unwrap();
        assert_eq!(pixels.dim(), (2, 2, 2));
        assert_eq!(pixels.slice(ndarray::s![0, 0, ..]).to_vec(), vec![500.0, 500.0]);
        assert_eq!(pixels.slice(ndarray::s![0, 1, ..]).to_vec(), vec![1000.0, 0.0]);
        // Frame 1 joint 1 sits on the camera plane
        assert_eq!(projected.row(0).to_vec(), vec![1.0, 1.0]);
        assert_eq!(projected.row(1).to_vec(), vec![1.0, 0.0]);
    }
}
