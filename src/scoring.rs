// src/scoring.rs
//
// Sequence-model seams. Both models consume the last `POSE_WINDOW` pose
// frames flattened to [1, 30, 2 * keypoints] and return one scalar:
//   - motion anomaly: reconstruction error of a pose autoencoder
//   - theft: classifier probability in [0, 1]
// The analyzer only calls a scorer when the window is exactly full.

use crate::history::POSE_WINDOW;
use crate::types::Keypoints;
use anyhow::Result;

pub trait PoseSequenceScorer: Send {
    fn score(&mut self, window: &[Keypoints]) -> Result<f32>;

    fn name(&self) -> &str;
}

/// Always scores 0. Stands in for a model that is not configured, which
/// permanently disables the detection rules that depend on it.
#[derive(Debug, Default)]
pub struct DisabledScorer;

impl PoseSequenceScorer for DisabledScorer {
    fn score(&mut self, _window: &[Keypoints]) -> Result<f32> {
        Ok(0.0)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Flatten a pose window into the model input layout, padding short
/// keypoint sets with zeros (and truncating long ones) so every row has
/// `2 * keypoints_per_frame` values.
pub fn flatten_window(window: &[Keypoints], keypoints_per_frame: usize) -> Vec<f32> {
    let row = keypoints_per_frame * 2;
    let mut data = Vec::with_capacity(window.len() * row);
    for kp in window {
        let start = data.len();
        kp.flatten_into(&mut data);
        data.resize(start + row, 0.0);
    }
    data
}

/// Mean absolute difference between a reconstruction and its input
pub fn mean_abs_error(input: &[f32], reconstruction: &[f32]) -> f32 {
    let n = input.len().min(reconstruction.len());
    if n == 0 {
        return 0.0;
    }
    let total: f32 = input
        .iter()
        .zip(reconstruction)
        .map(|(a, b)| (a - b).abs())
        .sum();
    total / n as f32
}

pub const KEYPOINTS_PER_FRAME: usize = 17;

/// Input tensor shape expected by both sequence models
pub fn window_shape() -> [usize; 3] {
    [1, POSE_WINDOW, KEYPOINTS_PER_FRAME * 2]
}

#[cfg(feature = "onnx")]
pub mod onnx {
    use super::*;
    use anyhow::Context;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use tracing::{debug, info};

    fn open_session(path: &str, num_threads: usize) -> Result<Session> {
        info!("Loading sequence model: {}", path);
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_threads)?
            .with_inter_threads(1)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model {}", path))?;
        info!("✓ Model ready: {}", path);
        Ok(session)
    }

    fn run(session: &mut Session, data: Vec<f32>) -> Result<Vec<f32>> {
        let shape = window_shape();
        let input = ort::value::Value::from_array((shape.as_slice(), data.into_boxed_slice()))?;
        let outputs = session.run(ort::inputs![input])?;
        let (_, values) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(values.to_vec())
    }

    /// Pose autoencoder; the score is the mean absolute reconstruction error.
    pub struct OnnxReconstructionScorer {
        session: Session,
    }

    impl OnnxReconstructionScorer {
        pub fn new(path: &str, num_threads: usize) -> Result<Self> {
            Ok(Self {
                session: open_session(path, num_threads)?,
            })
        }
    }

    impl PoseSequenceScorer for OnnxReconstructionScorer {
        fn score(&mut self, window: &[Keypoints]) -> Result<f32> {
            let input = flatten_window(window, KEYPOINTS_PER_FRAME);
            let reconstruction = run(&mut self.session, input.clone())?;
            let err = mean_abs_error(&input, &reconstruction);
            debug!("Reconstruction error {:.4}", err);
            Ok(err)
        }

        fn name(&self) -> &str {
            "onnx-autoencoder"
        }
    }

    /// Binary classifier; the score is the first output element.
    pub struct OnnxProbabilityScorer {
        session: Session,
    }

    impl OnnxProbabilityScorer {
        pub fn new(path: &str, num_threads: usize) -> Result<Self> {
            Ok(Self {
                session: open_session(path, num_threads)?,
            })
        }
    }

    impl PoseSequenceScorer for OnnxProbabilityScorer {
        fn score(&mut self, window: &[Keypoints]) -> Result<f32> {
            let output = run(&mut self.session, flatten_window(window, KEYPOINTS_PER_FRAME))?;
            output
                .first()
                .copied()
                .context("Classifier returned an empty tensor")
        }

        fn name(&self) -> &str {
            "onnx-classifier"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_pads_short_frames() {
        let window = vec![Keypoints(vec![[0.1, 0.2]]), Keypoints(vec![[0.3, 0.4], [0.5, 0.6]])];
        let data = flatten_window(&window, 2);
        assert_eq!(data, vec![0.1, 0.2, 0.0, 0.0, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_full_window_matches_model_shape() {
        let window = vec![Keypoints(vec![[1.0, 1.0]; 17]); POSE_WINDOW];
        let data = flatten_window(&window, KEYPOINTS_PER_FRAME);
        let [_, frames, row] = window_shape();
        assert_eq!(data.len(), frames * row);
    }

    #[test]
    fn test_mean_abs_error() {
        assert_eq!(mean_abs_error(&[1.0, 2.0], &[1.5, 1.0]), 0.75);
        assert_eq!(mean_abs_error(&[], &[]), 0.0);
    }

    #[test]
    fn test_disabled_scorer() {
        let mut s = DisabledScorer;
        assert_eq!(s.score(&[]).unwrap(), 0.0);
    }
}
