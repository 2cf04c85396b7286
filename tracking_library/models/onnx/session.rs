use crate::models::config::Device;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;
use tracking_core::error::{TrackingError, TrackingResult};

fn model_error(path: &Path, e: impl std::fmt::Display) -> TrackingError {
    TrackingError::Model(format!("{}: {}", path.display(), e))
}

/// Load an ONNX model onto `device`
pub fn build_session(path: &Path, device: Device, intra_threads: usize) -> TrackingResult<Session> {
    if !path.exists() {
        return Err(TrackingError::Model(format!(
            "Model file not found: {}",
            path.display()
        )));
    }

    let builder = Session::builder()
        .map_err(|e| model_error(path, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| model_error(path, e))?
        .with_intra_threads(intra_threads)
        .map_err(|e| model_error(path, e))?;

    let builder = match device {
        Device::Cpu => builder
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| model_error(path, e))?,
        Device::Cuda(id) => builder
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(id)
                .build()
                .error_on_failure()])
            .map_err(|e| model_error(path, e))?,
    };

    let session = builder
        .commit_from_file(path)
        .map_err(|e| model_error(path, e))?;

    tracing::info!(
        model = %path.display(),
        %device,
        inputs = ?session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
        "ONNX model loaded"
    );
    Ok(session)
}

pub(crate) fn inference_error(e: impl std::fmt::Display) -> TrackingError {
    TrackingError::Inference(e.to_string())
}
