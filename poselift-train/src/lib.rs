//! Poselift Training Crate
//!
//! Turns loaded annotations into training data for 3D pose lifting models.
//!
//! ## Modules
//!
//! - [`dataset`]: Grouping frames per video and cutting them into sequences
//! - [`codec`]: Encoding keypoints into training labels and decoding predictions

pub mod codec;
pub mod dataset;
pub mod error;

pub use codec::{EncodedLabel, PoseLiftingCodec, PoseLiftingConfig, ScoreStrategy};
pub use dataset::{DatasetConfig, KeypointSource, MocapDataset, MocapSample, SequenceConfig, SequenceIndex};
pub use error::TrainError;
