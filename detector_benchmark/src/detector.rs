use crate::backends::{OnnxRuntimeDetector, OrtPipelineDetector, TractDetector};
use crate::config::ModelSettings;
use crate::detection::Detection;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Detector not initialized")]
    NotInitialized,
    #[error("{0}")]
    Initialization(String),
    #[error("{0}")]
    Inference(String),
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("tract error: {0}")]
    Tract(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Inference task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// An object-detection inference engine under benchmark.
#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    /// Loads the model. Must succeed before `detect` is called.
    async fn initialize(&mut self, model_path: &Path) -> Result<(), DetectorError>;

    async fn detect(&self, image_path: &Path) -> Result<Vec<Detection>, DetectorError>;

    /// Releases the model session. Safe to call more than once.
    fn dispose(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OnnxRuntime,
    OrtPipeline,
    Tract,
}

impl BackendKind {
    /// Benchmark order.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::OnnxRuntime,
        BackendKind::OrtPipeline,
        BackendKind::Tract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OnnxRuntime => "OnnxRuntime",
            BackendKind::OrtPipeline => "OrtPipeline",
            BackendKind::Tract => "Tract",
        }
    }

    pub fn build(self, settings: &ModelSettings) -> Box<dyn Detector> {
        match self {
            BackendKind::OnnxRuntime => Box::new(OnnxRuntimeDetector::new(settings)),
            BackendKind::OrtPipeline => Box::new(OrtPipelineDetector::new(settings)),
            BackendKind::Tract => Box::new(TractDetector::new(settings)),
        }
    }
}

pub fn all_backends(settings: &ModelSettings) -> Vec<Box<dyn Detector>> {
    BackendKind::ALL
        .iter()
        .map(|kind| kind.build(settings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_backends_in_benchmark_order() {
        let detectors = all_backends(&ModelSettings::default());
        let names: Vec<&str> = detectors.iter().map(|d| d.name()).collect();

        assert_eq!(names, vec!["OnnxRuntime", "OrtPipeline", "Tract"]);
    }

    #[tokio::test]
    async fn test_detect_before_initialize_fails() {
        for mut detector in all_backends(&ModelSettings::default()) {
            let err = detector
                .detect(Path::new("assets/test_image.jpg"))
                .await
                .unwrap_err();
            assert!(matches!(err, DetectorError::NotInitialized));
            assert_eq!(err.to_string(), "Detector not initialized");
            detector.dispose();
            detector.dispose();
        }
    }

    #[tokio::test]
    async fn test_initialize_with_missing_model_fails() {
        for mut detector in all_backends(&ModelSettings::default()) {
            let result = detector
                .initialize(Path::new("./does_not_exist/model.onnx"))
                .await;
            assert!(result.is_err(), "{} accepted a missing model", detector.name());
        }
    }
}
