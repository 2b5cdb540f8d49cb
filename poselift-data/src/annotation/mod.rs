//! Annotation table and file loading

mod loader;
mod table;

pub use loader::{load_annotations, load_factors, load_keypoint_2d_detections};
pub use table::AnnotationTable;
