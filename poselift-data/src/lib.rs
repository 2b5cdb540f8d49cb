//! Poselift Data Crate
//!
//! Annotation loading and lookup for 3D pose lifting datasets: image-name
//! parsing into per-video keys, columnar annotation tables, detection and
//! factor files, and camera parameters.
//! This crate is model-agnostic and performs no label encoding.

pub mod annotation;
pub mod camera;
pub mod error;
pub mod types;

pub use annotation::{AnnotationTable, load_annotations, load_factors, load_keypoint_2d_detections};
pub use camera::{CameraParam, CameraParamStore};
pub use error::DataError;
pub use types::VideoKey;
