use super::{ensure_model_file, run_ort_session};
use crate::config::ModelSettings;
use crate::detection::Detection;
use crate::detector::{BackendKind, Detector, DetectorError};
use crate::yolo;
use async_trait::async_trait;
use image::GenericImageView;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// ONNX Runtime with full graph optimisation followed by non-maximum
/// suppression, the way a packaged YOLO pipeline post-processes.
pub struct OrtPipelineDetector {
    session: Option<Arc<Mutex<Session>>>,
    settings: ModelSettings,
}

impl OrtPipelineDetector {
    pub fn new(settings: &ModelSettings) -> Self {
        Self {
            session: None,
            settings: settings.clone(),
        }
    }
}

#[async_trait]
impl Detector for OrtPipelineDetector {
    fn name(&self) -> &str {
        BackendKind::OrtPipeline.as_str()
    }

    async fn initialize(&mut self, model_path: &Path) -> Result<(), DetectorError> {
        ensure_model_file(model_path)?;
        let model_path = model_path.to_path_buf();

        let session = tokio::task::spawn_blocking(move || {
            Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(&model_path)
        })
        .await??;

        self.session = Some(Arc::new(Mutex::new(session)));
        tracing::debug!("{} session created", self.name());
        Ok(())
    }

    async fn detect(&self, image_path: &Path) -> Result<Vec<Detection>, DetectorError> {
        let session = self.session.clone().ok_or(DetectorError::NotInitialized)?;
        let image_path = image_path.to_path_buf();
        let settings = self.settings.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<Detection>, DetectorError> {
            let image = image::open(&image_path)?;
            let (width, height) = image.dimensions();
            let input =
                yolo::image_to_tensor(&image, settings.input_width, settings.input_height);
            let output = run_ort_session(&session, &input)?;
            let boxes = yolo::decode_output(output.view(), &settings, width, height)?;
            Ok(yolo::non_maximum_suppression(boxes, settings.iou_threshold))
        })
        .await?
    }

    fn dispose(&mut self) {
        self.session.take();
    }
}
