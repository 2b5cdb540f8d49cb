//! Label codecs for pose lifting
//!
//! A codec turns raw 2D/3D annotations into normalized training labels
//! (`encode`) and model outputs back into coordinates (`decode`).

pub mod pose_lifting;
pub mod score;

pub use pose_lifting::{EncodedLabel, PoseLiftingCodec, PoseLiftingConfig};
pub use score::ScoreStrategy;
