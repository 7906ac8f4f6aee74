mod onnx_runtime;
mod ort_pipeline;
mod tract;

pub use onnx_runtime::OnnxRuntimeDetector;
pub use ort_pipeline::OrtPipelineDetector;
pub use tract::TractDetector;

use crate::detector::DetectorError;
use ndarray::{Array, ArrayD, Ix4};
use ort::{session::Session, value::TensorRef};
use std::path::Path;
use std::sync::Mutex;

fn ensure_model_file(model_path: &Path) -> Result<(), DetectorError> {
    if !model_path.is_file() {
        return Err(DetectorError::Initialization(format!(
            "Model file not found: {}",
            model_path.display()
        )));
    }
    Ok(())
}

/// Runs one forward pass and copies the first output out of the session.
fn run_ort_session(
    session: &Mutex<Session>,
    input: &Array<f32, Ix4>,
) -> Result<ArrayD<f32>, DetectorError> {
    let mut session = session
        .lock()
        .map_err(|e| DetectorError::Inference(format!("session mutex poisoned: {}", e)))?;

    let owned_buffer;
    let input_view = if input.view().is_standard_layout() {
        input.view()
    } else {
        owned_buffer = input.as_standard_layout().to_owned();
        owned_buffer.view()
    };

    let tensor_ref = TensorRef::from_array_view(input_view)?;
    let outputs = session.run(ort::inputs![tensor_ref])?;

    let (shape, data) = outputs["output0"].try_extract_tensor::<f32>()?;
    let array = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())?;

    Ok(array)
}
