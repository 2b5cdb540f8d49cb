//! Sequence datasets for pose lifting
//!
//! Frames are grouped per (subject, action, camera) video and cut into
//! fixed-length sequences, optionally padded or merged.

pub mod config;
pub mod mocap;
pub mod sequence;

pub use config::{DatasetConfig, KeypointSource};
pub use mocap::{MocapDataset, MocapSample};
pub use sequence::{SequenceConfig, SequenceIndex, build_sequences, group_by_video, select_subset};
