use std::path::Path;

use anyhow::{Context, Result, anyhow};
use fast_image_resize::Resizer;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{MIN_POSE_PRESENCE, PoseEngine, common};
use crate::types::{Frame, LandmarkSet};

/// BlazePose full-body landmark model run through ONNX Runtime.
///
/// Expects a `1x256x256x3` float input; output 0 is the flat landmark tensor
/// and output 1 the pose presence score.
pub struct OrtPoseEngine {
    session: Session,
    resizer: Resizer,
}

impl OrtPoseEngine {
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(anyhow!("pose model not found at {}", model_path.display()));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        log::info!("pose landmark model ready using {}", model_path.display());

        Ok(Self {
            session,
            resizer: Resizer::new(),
        })
    }
}

impl PoseEngine for OrtPoseEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let (input, letterbox) = common::prepare_input(frame, &mut self.resizer)?;
        let side = common::INPUT_SIZE as usize;
        let tensor = Tensor::from_array(([1usize, side, side, 3], input))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run pose landmark model")?;

        if outputs.len() < 2 {
            return Err(anyhow!("model returned {} outputs, expected 2", outputs.len()));
        }

        let presence = outputs[1]
            .try_extract_array::<f32>()
            .ok()
            .and_then(|arr| arr.iter().next().copied())
            .unwrap_or(0.0);
        if presence < MIN_POSE_PRESENCE {
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = common::decode_landmarks(&flattened, &letterbox)?;

        Ok(Some(LandmarkSet::new(landmarks)))
    }
}
