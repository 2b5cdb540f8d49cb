//! Sequence index construction over per-video frame groups

use crate::error::TrainError;
use poselift_data::VideoKey;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Frame indices forming one training sample's temporal window.
pub type SequenceIndex = Vec<usize>;

/// How frames of a video are cut into sequences.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Number of frames in a sequence.
    pub seq_len: usize,
    /// Interval between sampled frames.
    pub seq_step: usize,
    /// If non-zero, merge every `multiple_target` consecutive frames into one
    /// sequence where every frame is a target.
    pub multiple_target: usize,
    /// Pad videos so that every frame is the target of one sequence.
    pub pad_video_seq: bool,
    /// Target the rightmost frame of a window instead of the middle one.
    pub causal: bool,
    /// Fraction of sequences to keep, as one contiguous block.
    pub subset_frac: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            seq_len: 1,
            seq_step: 1,
            multiple_target: 0,
            pad_video_seq: false,
            causal: true,
            subset_frac: 1.0,
        }
    }
}

impl SequenceConfig {
    /// Reject values the windowing cannot work with.
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.seq_len == 0 {
            return Err(TrainError::InvalidConfiguration(
                "seq_len must be at least 1".to_string(),
            ));
        }
        if self.seq_step == 0 {
            return Err(TrainError::InvalidConfiguration(
                "seq_step must be at least 1".to_string(),
            ));
        }
        if !(self.subset_frac > 0.0 && self.subset_frac <= 1.0) {
            return Err(TrainError::InvalidConfiguration(format!(
                "subset_frac must be in (0, 1], got {}",
                self.subset_frac
            )));
        }
        Ok(())
    }

    /// Number of source frames spanned by one unpadded window.
    pub fn window_len(&self) -> usize {
        (self.seq_len - 1) * self.seq_step + 1
    }

    /// Positions within a sequence of length `len` that carry supervision.
    pub fn target_indices(&self, len: usize) -> Vec<usize> {
        if len == 0 {
            Vec::new()
        } else if self.multiple_target > 0 {
            (0..len).collect()
        } else if self.causal {
            vec![len - 1]
        } else {
            vec![len / 2]
        }
    }

    /// Frames before and after the target frame in a padded window.
    fn padded_extent(&self) -> (usize, usize) {
        if self.causal {
            (self.seq_len - 1, 0)
        } else {
            let left = self.seq_len / 2;
            (left, self.seq_len - 1 - left)
        }
    }
}

/// Group frame indices by video, keeping the original order inside a video.
///
/// The map iterates videos in lexicographic key order.
pub fn group_by_video<S: AsRef<str>>(
    image_names: &[S],
) -> Result<BTreeMap<VideoKey, Vec<usize>>, TrainError> {
    let mut videos: BTreeMap<VideoKey, Vec<usize>> = BTreeMap::new();
    for (index, name) in image_names.iter().enumerate() {
        let key = VideoKey::parse(name.as_ref())?;
        videos.entry(key).or_default().push(index);
    }
    Ok(videos)
}

/// Build the ordered list of training sequences for a set of frames.
///
/// `rng` is only drawn from when `subset_frac < 1`.
pub fn build_sequences<S, R>(
    image_names: &[S],
    config: &SequenceConfig,
    rng: &mut R,
) -> Result<Vec<SequenceIndex>, TrainError>
where
    S: AsRef<str>,
    R: Rng,
{
    config.validate()?;
    let videos = group_by_video(image_names)?;

    let mut sequences = Vec::new();
    for (key, frames) in &videos {
        let before = sequences.len();
        if config.multiple_target > 0 {
            merged_sequences(frames, config.multiple_target, config.seq_step, &mut sequences);
        } else if config.pad_video_seq {
            padded_sequences(frames, config, &mut sequences);
        } else {
            sliding_sequences(frames, config.window_len(), config.seq_step, &mut sequences);
        }
        debug!(
            "Video {}: {} frames -> {} sequences",
            key,
            frames.len(),
            sequences.len() - before
        );
    }

    Ok(select_subset(sequences, config.subset_frac, rng))
}

fn merged_sequences(frames: &[usize], group: usize, step: usize, out: &mut Vec<SequenceIndex>) {
    // chunks_exact drops the trailing partial group
    out.extend(
        frames
            .chunks_exact(group)
            .map(|chunk| chunk.iter().step_by(step).copied().collect()),
    );
}

fn padded_sequences(frames: &[usize], config: &SequenceConfig, out: &mut Vec<SequenceIndex>) {
    let (Some(&first), Some(&last)) = (frames.first(), frames.last()) else {
        return;
    };
    let n = frames.len();
    let step = config.seq_step;
    let (frames_left, frames_right) = config.padded_extent();

    for i in 0..n {
        let pad_left = frames_left.saturating_sub(i / step);
        let pad_right = frames_right.saturating_sub((n - 1 - i) / step);
        let start = (i % step).max(i.saturating_sub(frames_left * step));
        let end = (n - (n - 1 - i) % step).min(i + frames_right * step + 1);

        let mut sequence = Vec::with_capacity(config.seq_len);
        sequence.extend(std::iter::repeat_n(first, pad_left));
        sequence.extend(frames[start..end].iter().step_by(step).copied());
        sequence.extend(std::iter::repeat_n(last, pad_right));
        out.push(sequence);
    }
}

fn sliding_sequences(frames: &[usize], window: usize, step: usize, out: &mut Vec<SequenceIndex>) {
    // windows() yields nothing when the video is shorter than the window
    out.extend(
        frames
            .windows(window)
            .map(|w| w.iter().step_by(step).copied().collect()),
    );
}

/// Keep a contiguous block of `round(len * frac)` sequences at a random offset.
pub fn select_subset<R: Rng>(
    sequences: Vec<SequenceIndex>,
    frac: f64,
    rng: &mut R,
) -> Vec<SequenceIndex> {
    if frac >= 1.0 {
        return sequences;
    }
    let total = sequences.len();
    let size = ((total as f64 * frac).round() as usize).min(total);
    let start = rng.random_range(0..=total - size);
    debug!("Keeping sequences {}..{} of {}", start, start + size, total);
    sequences.into_iter().skip(start).take(size).collect()
}
