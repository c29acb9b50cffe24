//! Learned collision model backed by an ONNX inference session.
//!
//! The model takes a `[1, 2]` tensor of `[accel, gyro]` and produces a single
//! collision probability as the first scalar of its output. Loading and
//! inference both require the `ml_onnx` feature; without it, construction
//! fails and the classifier runs the threshold rule for its entire lifetime.

use crate::error::{AppResult, SentinelError};
use std::path::Path;

#[cfg(feature = "ml_onnx")]
mod onnx {
    use super::*;
    use ort::session::Session;
    use parking_lot::Mutex;
    use tracing::info;

    /// ONNX session wrapper for the collision model.
    pub struct LearnedModel {
        session: Mutex<Session>,
        input_name: String,
        output_name: String,
    }

    impl std::fmt::Debug for LearnedModel {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("LearnedModel")
                .field("input_name", &self.input_name)
                .field("output_name", &self.output_name)
                .finish()
        }
    }

    impl LearnedModel {
        /// Load the model from an ONNX file and build an inference session.
        pub fn load(path: &Path) -> AppResult<Self> {
            info!(?path, "Loading collision model");

            let session = Session::builder()
                .map_err(|e| {
                    SentinelError::Inference(format!("Failed to create session builder: {e}"))
                })?
                .commit_from_file(path)
                .map_err(|e| SentinelError::Inference(format!("Failed to load model: {e}")))?;

            let input_name = session
                .inputs()
                .iter()
                .map(|input| input.name().to_string())
                .next()
                .ok_or_else(|| SentinelError::Inference("Model declares no inputs".into()))?;
            let output_name = session
                .outputs()
                .iter()
                .map(|output| output.name().to_string())
                .next()
                .ok_or_else(|| SentinelError::Inference("Model declares no outputs".into()))?;

            info!(input = %input_name, output = %output_name, "Collision model loaded");

            Ok(Self {
                session: Mutex::new(session),
                input_name,
                output_name,
            })
        }

        /// Run the model on one sample pair and return the first output scalar.
        pub fn predict(&self, accel: f32, gyro: f32) -> AppResult<f32> {
            let tensor = ort::value::Tensor::from_array((vec![1i64, 2], vec![accel, gyro]))
                .map_err(|e| SentinelError::Inference(format!("Failed to create tensor: {e}")))?;

            let mut session = self.session.lock();
            let inputs = ort::inputs![self.input_name.as_str() => tensor];
            let outputs = session
                .run(inputs)
                .map_err(|e| SentinelError::Inference(format!("Inference failed: {e}")))?;

            let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
                SentinelError::Inference(format!("Missing output: {}", self.output_name))
            })?;
            let (_shape, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| SentinelError::Inference(format!("Output extraction failed: {e}")))?;

            data.first()
                .copied()
                .ok_or_else(|| SentinelError::Inference("Model returned an empty output".into()))
        }
    }
}

#[cfg(feature = "ml_onnx")]
pub use onnx::LearnedModel;

/// Stub used when the `ml_onnx` feature is disabled. Construction always
/// fails, which routes the classifier onto the threshold rule.
#[cfg(not(feature = "ml_onnx"))]
#[derive(Debug)]
pub struct LearnedModel {
    _private: (),
}

#[cfg(not(feature = "ml_onnx"))]
impl LearnedModel {
    /// Always fails: inference support was not compiled in.
    pub fn load(_path: &Path) -> AppResult<Self> {
        Err(SentinelError::FeatureNotEnabled("ml_onnx"))
    }

    /// Unreachable in practice since `load` never succeeds.
    pub fn predict(&self, _accel: f32, _gyro: f32) -> AppResult<f32> {
        Err(SentinelError::FeatureNotEnabled("ml_onnx"))
    }
}
