//! Video keys parsed from annotated image names.
//!
//! Image names follow the Human3.6M convention
//! `{subject}_{action}.{camera}_{frame}.ext`, e.g.
//! `S1_Directions_1.54138969_000001.jpg`.

use crate::error::DataError;
use std::fmt;
use std::path::Path;

/// Identifies one continuous capture: all frames of a (subject, action, camera).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoKey {
    pub subject: String,
    pub action: String,
    pub camera: String,
}

impl VideoKey {
    /// Create a key from its three parts.
    pub fn new(
        subject: impl Into<String>,
        action: impl Into<String>,
        camera: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            action: action.into(),
            camera: camera.into(),
        }
    }

    /// Parse a key from an image name. Directory components are ignored.
    pub fn parse(image_name: &str) -> Result<Self, DataError> {
        let invalid = || DataError::InvalidImageName(image_name.to_string());

        let base = Path::new(image_name)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(invalid)?;

        let (subject, rest) = base.split_once('_').ok_or_else(invalid)?;
        let (action, rest) = rest.split_once('.').ok_or_else(invalid)?;
        let (camera, _frame) = rest.split_once('_').ok_or_else(invalid)?;

        if subject.is_empty() || action.is_empty() || camera.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(subject, action, camera))
    }

    /// The (subject, camera) projection used to look up camera parameters.
    pub fn camera_key(&self) -> (&str, &str) {
        (&self.subject, &self.camera)
    }
}

impl fmt::Display for VideoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.{}", self.subject, self.action, self.camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_name() {
        let key = VideoKey::parse("S1_Directions_1.54138969_000001.jpg").unwrap();
        assert_eq!(key, VideoKey::new("S1", "Directions_1", "54138969"));
    }

    #[test]
    fn test_parse_ignores_directories() {
        let key = VideoKey::parse(
            "S1/S1_Directions_1.54138969/S1_Directions_1.54138969_000001.jpg",
        )
        .unwrap();
        assert_eq!(key.subject, "S1");
        assert_eq!(key.action, "Directions_1");
        assert_eq!(key.camera, "54138969");
        assert_eq!(key.camera_key(), ("S1", "54138969"));
    }

    #[test]
    fn test_parse_action_with_spaces() {
        let key = VideoKey::parse("S11_Walk Dog.60457274_001234.jpg").unwrap();
        assert_eq!(key.action, "Walk Dog");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            VideoKey::parse("frame_0001.jpg"),
            Err(DataError::InvalidImageName(_))
        ));
        assert!(VideoKey::parse("nounderscore").is_err());
        assert!(VideoKey::parse("S1_Walk.cam").is_err());
    }

    #[test]
    fn test_keys_order_lexicographically() {
        let a = VideoKey::new("S1", "Directions", "1");
        let b = VideoKey::new("S1", "Directions", "2");
        let c = VideoKey::new("S5", "Directions", "1");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_display_round_trips_prefix() {
        let key = VideoKey::new("S9", "Sitting", "55011271");
        let name = format!("{}_000010.jpg", key);
        assert_eq!(VideoKey::parse(&name).unwrap(), key);
    }
}
