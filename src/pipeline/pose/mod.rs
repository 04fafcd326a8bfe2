pub(crate) mod common;
mod ort;

pub use self::ort::OrtPoseEngine;

use crate::types::{Frame, LandmarkSet};

/// Minimum pose-presence score before landmarks are trusted.
pub const MIN_POSE_PRESENCE: f32 = 0.5;

/// Per-frame pose landmark inference.
///
/// `Ok(None)` means the model ran but found no person in the frame.
pub trait PoseEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Option<LandmarkSet>>;
}
